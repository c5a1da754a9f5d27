/// Index-linked draw order over the animation pool.
///
/// The list never owns objects; it stores one successor link per pool slot
/// and keeps the chain sorted ascending by the key supplied at insertion
/// time (the object's anchor y).
#[derive(Debug, Clone)]
pub struct ZOrderList {
    head: Option<usize>,
    next: Vec<Option<usize>>,
    linked: Vec<bool>,
    len: usize,
}

impl ZOrderList {
    pub fn new(capacity: usize) -> Self {
        Self {
            head: None,
            next: vec![None; capacity],
            linked: vec![false; capacity],
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.next.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, index: usize) -> bool {
        self.linked.get(index).copied().unwrap_or(false)
    }

    pub fn head(&self) -> Option<usize> {
        self.head
    }

    pub fn successor(&self, index: usize) -> Option<usize> {
        if !self.contains(index) {
            return None;
        }
        self.next[index]
    }

    /// Links `index` before the first node whose key exceeds its own, so
    /// equal keys keep insertion order. Returns false when the index is out
    /// of range or already linked.
    pub fn insert_sorted<K>(&mut self, index: usize, key: K) -> bool
    where
        K: Fn(usize) -> i32,
    {
        if index >= self.capacity() || self.linked[index] {
            return false;
        }
        let y = key(index);
        let mut prev: Option<usize> = None;
        let mut cursor = self.head;
        while let Some(current) = cursor {
            if key(current) > y {
                break;
            }
            prev = Some(current);
            cursor = self.next[current];
        }

        self.next[index] = cursor;
        match prev {
            Some(prev) => self.next[prev] = Some(index),
            None => self.head = Some(index),
        }
        self.linked[index] = true;
        self.len += 1;
        true
    }

    /// Unlinks `index`; absent indices are ignored.
    pub fn remove(&mut self, index: usize) -> bool {
        if !self.contains(index) {
            return false;
        }
        let successor = self.next[index];
        if self.head == Some(index) {
            self.head = successor;
        } else {
            let mut cursor = self.head;
            while let Some(current) = cursor {
                if self.next[current] == Some(index) {
                    self.next[current] = successor;
                    break;
                }
                cursor = self.next[current];
            }
        }
        self.next[index] = None;
        self.linked[index] = false;
        self.len -= 1;
        true
    }

    pub fn clear(&mut self) {
        self.head = None;
        self.next.iter_mut().for_each(|link| *link = None);
        self.linked.iter_mut().for_each(|flag| *flag = false);
        self.len = 0;
    }

    pub fn iter(&self) -> ZOrderIter<'_> {
        ZOrderIter {
            list: self,
            cursor: self.head,
            remaining: self.len,
        }
    }
}

pub struct ZOrderIter<'a> {
    list: &'a ZOrderList,
    cursor: Option<usize>,
    remaining: usize,
}

impl Iterator for ZOrderIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        // `remaining` bounds the walk even if a link were ever corrupted.
        if self.remaining == 0 {
            return None;
        }
        let current = self.cursor?;
        self.cursor = self.list.next[current];
        self.remaining -= 1;
        Some(current)
    }
}
