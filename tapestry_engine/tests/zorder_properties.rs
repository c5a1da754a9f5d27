use proptest::prelude::*;
use tapestry_engine::registry::{ObjectSetup, Registry, POOL_CAPACITY};
use tapestry_engine::Point;

#[derive(Debug, Clone)]
enum Op {
    Populate { index: usize, y: i32 },
    Enable(usize),
    Disable(usize),
    Move { index: usize, y: i32 },
}

fn op() -> impl Strategy<Value = Op> {
    let index = 0..POOL_CAPACITY;
    let y = -20i32..220;
    prop_oneof![
        (index.clone(), y.clone()).prop_map(|(index, y)| Op::Populate { index, y }),
        index.clone().prop_map(Op::Enable),
        index.clone().prop_map(Op::Disable),
        (index, y).prop_map(|(index, y)| Op::Move { index, y }),
    ]
}

proptest! {
    #[test]
    fn draw_order_stays_sorted_and_matches_enabled_slots(
        ops in prop::collection::vec(op(), 1..200)
    ) {
        let mut registry = Registry::new();
        for op in ops {
            match op {
                Op::Populate { index, y } => {
                    let setup = ObjectSetup::at(Point::new(index as i32, y), None);
                    registry.populate(index, setup).unwrap();
                }
                Op::Enable(index) => registry.enable(index).unwrap(),
                Op::Disable(index) => registry.disable(index).unwrap(),
                Op::Move { index, y } => {
                    registry.move_to(index, Point::new(index as i32, y)).unwrap()
                }
            }
            prop_assert_eq!(registry.check_invariants(), Ok(()));
        }

        let ys: Vec<i32> = registry.iter_zorder().map(|object| object.anchor.y).collect();
        prop_assert!(ys.windows(2).all(|pair| pair[0] <= pair[1]));
        let enabled = registry.iter().filter(|object| object.enabled).count();
        prop_assert_eq!(registry.zorder().len(), enabled);
    }

    #[test]
    fn rebuilding_the_order_keeps_the_same_members(
        ys in prop::collection::vec(-50i32..250, 1..40)
    ) {
        let mut registry = Registry::new();
        for (index, y) in ys.iter().enumerate() {
            registry.populate(index, ObjectSetup::at(Point::new(0, *y), None)).unwrap();
            registry.enable(index).unwrap();
        }
        let mut before: Vec<usize> = registry.zorder().iter().collect();
        registry.rebuild_zorder();
        let mut after: Vec<usize> = registry.zorder().iter().collect();
        prop_assert_eq!(registry.check_invariants(), Ok(()));
        before.sort_unstable();
        after.sort_unstable();
        prop_assert_eq!(before, after);
    }
}
