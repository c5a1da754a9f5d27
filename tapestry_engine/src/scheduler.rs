use serde::Serialize;

use crate::error::ScriptFault;
use crate::script::{
    CommandOrigin, CommandQueue, ProgramId, ScriptCommand, ScriptContext, ScriptInterpreter,
};
use crate::timing::Clock;

pub const AMBIENT_SLOT_COUNT: usize = 10;

/// Receives every ambient command the scheduler does not handle itself.
pub trait CommandSink {
    /// Applies `command`; a returned value is delivered to the script as
    /// the reply of a query.
    fn dispatch(&mut self, origin: CommandOrigin, command: ScriptCommand) -> Option<i32>;

    /// Records a command the scheduler rejected.
    fn fault(&mut self, origin: CommandOrigin, command: &ScriptCommand, fault: ScriptFault);
}

#[derive(Debug, Clone, Default)]
struct AmbientSlot {
    context: ScriptContext,
    entry: u16,
    next_run_at: u64,
    suspended: bool,
    run_flag: bool,
}

/// Outcome of one [`AmbientScheduler::update`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AmbientPass {
    pub visited: Vec<usize>,
    pub executed: Vec<usize>,
    pub restarted: Vec<usize>,
    pub steps: u64,
    /// The soft time budget ran out before every slot was visited.
    pub overrun: bool,
    /// Slots cut short by the per-visit step cap.
    pub runaway: Vec<usize>,
}

/// Round-robin runner for the scene's ten ambient scripts.
///
/// Each slot owns a context started at `entry_base + slot` of the scene
/// program. A pass starts at the slot after the last one processed, so a
/// budget overrun never starves the tail of the table.
#[derive(Debug, Clone)]
pub struct AmbientScheduler {
    slots: Vec<AmbientSlot>,
    last_processed: usize,
    entry_base: u16,
    tick_length_ms: u64,
    budget_ms: u64,
    max_steps_per_visit: usize,
    bound: bool,
}

impl AmbientScheduler {
    pub fn new(entry_base: u16, tick_length_ms: u64, max_steps_per_visit: usize) -> Self {
        let slots = (0..AMBIENT_SLOT_COUNT)
            .map(|slot| AmbientSlot {
                context: ScriptContext::new(format!("ambient.{slot}")),
                entry: entry_base + slot as u16,
                ..AmbientSlot::default()
            })
            .collect();
        Self {
            slots,
            last_processed: 0,
            entry_base,
            tick_length_ms,
            budget_ms: tick_length_ms,
            max_steps_per_visit: max_steps_per_visit.max(1),
            bound: false,
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    pub fn last_processed(&self) -> usize {
        self.last_processed
    }

    /// Starts every slot on `program`, all immediately eligible.
    pub fn bind(&mut self, vm: &mut dyn ScriptInterpreter, program: ProgramId) {
        for slot in &mut self.slots {
            vm.init_context(&mut slot.context, program);
            vm.start_entry_point(&mut slot.context, slot.entry);
            slot.next_run_at = 0;
            slot.suspended = false;
            slot.run_flag = false;
        }
        self.last_processed = 0;
        self.bound = true;
    }

    /// Unloads every context and clears timers and suspension.
    pub fn clear(&mut self, vm: &mut dyn ScriptInterpreter) {
        for slot in &mut self.slots {
            vm.unload(&mut slot.context);
            slot.next_run_at = 0;
            slot.suspended = false;
            slot.run_flag = false;
        }
        self.last_processed = 0;
        self.bound = false;
    }

    pub fn set_cooldown(&mut self, slot: usize, ticks: u32, now: u64) -> Result<(), ScriptFault> {
        let tick_length = self.tick_length_ms;
        let entry = self
            .slots
            .get_mut(slot)
            .ok_or(ScriptFault::InvalidSlot(slot))?;
        entry.next_run_at = now + ticks as u64 * tick_length;
        Ok(())
    }

    pub fn set_suspended(&mut self, slot: usize, suspended: bool) -> Result<(), ScriptFault> {
        let entry = self
            .slots
            .get_mut(slot)
            .ok_or(ScriptFault::InvalidSlot(slot))?;
        entry.suspended = suspended;
        Ok(())
    }

    pub fn is_suspended(&self, slot: usize) -> Result<bool, ScriptFault> {
        self.slots
            .get(slot)
            .map(|entry| entry.suspended)
            .ok_or(ScriptFault::InvalidSlot(slot))
    }

    pub fn next_run_at(&self, slot: usize) -> Option<u64> {
        self.slots.get(slot).map(|entry| entry.next_run_at)
    }

    pub fn context(&self, slot: usize) -> Option<&ScriptContext> {
        self.slots.get(slot).map(|entry| &entry.context)
    }

    /// Applies a scheduler command issued by any script. Returns `None` for
    /// commands that belong to someone else.
    pub fn apply_control(
        &mut self,
        command: &ScriptCommand,
        now: u64,
    ) -> Option<Result<Option<i32>, ScriptFault>> {
        let result = match *command {
            ScriptCommand::SetCooldown { slot, ticks } => {
                self.set_cooldown(slot, ticks, now).map(|_| None)
            }
            ScriptCommand::Suspend { slot } => self.set_suspended(slot, true).map(|_| None),
            ScriptCommand::Resume { slot } => self.set_suspended(slot, false).map(|_| None),
            ScriptCommand::QuerySuspended { slot } => {
                self.is_suspended(slot).map(|flag| Some(flag as i32))
            }
            _ => return None,
        };
        Some(result)
    }

    /// Runs one fair pass over the slots.
    pub fn update(
        &mut self,
        vm: &mut dyn ScriptInterpreter,
        clock: &dyn Clock,
        sink: &mut dyn CommandSink,
    ) -> AmbientPass {
        let mut pass = AmbientPass::default();
        if !self.bound {
            return pass;
        }

        let deadline = clock.now_millis() + self.budget_ms;
        let start = self.last_processed;
        loop {
            let index = self.last_processed;
            pass.visited.push(index);

            let eligible = {
                let slot = &self.slots[index];
                !slot.suspended
                    && vm.is_valid(&slot.context)
                    && slot.next_run_at <= clock.now_millis()
            };
            if eligible {
                self.run_slot(index, vm, clock, sink, &mut pass);
                pass.executed.push(index);
            }

            if !vm.is_valid(&self.slots[index].context) {
                let slot = &mut self.slots[index];
                vm.start_entry_point(&mut slot.context, slot.entry);
                slot.run_flag = false;
                pass.restarted.push(index);
            }

            self.last_processed = (index + 1) % self.slots.len();
            if self.last_processed == start {
                break;
            }
            if clock.now_millis() > deadline {
                pass.overrun = true;
                log::debug!(
                    "ambient pass over budget; resuming at slot {} next tick",
                    self.last_processed
                );
                break;
            }
        }
        pass
    }

    fn run_slot(
        &mut self,
        index: usize,
        vm: &mut dyn ScriptInterpreter,
        clock: &dyn Clock,
        sink: &mut dyn CommandSink,
        pass: &mut AmbientPass,
    ) {
        let mut context = std::mem::take(&mut self.slots[index].context);
        self.slots[index].run_flag = true;
        let mut steps = 0usize;
        let mut queue = CommandQueue::new();

        while self.slots[index].run_flag && self.slots[index].next_run_at <= clock.now_millis() {
            if steps >= self.max_steps_per_visit {
                pass.runaway.push(index);
                log::warn!(
                    "ambient slot {index} ran {steps} steps without yielding; deferring"
                );
                break;
            }
            let running = vm.step_one(&mut context, &mut queue);
            steps += 1;
            pass.steps += 1;

            while let Some(command) = queue.pop() {
                self.route(index, command, &mut context, vm, clock, sink);
            }
            if !running {
                self.slots[index].run_flag = false;
            }
        }

        self.slots[index].run_flag = false;
        self.slots[index].context = context;
    }

    fn route(
        &mut self,
        index: usize,
        command: ScriptCommand,
        context: &mut ScriptContext,
        vm: &mut dyn ScriptInterpreter,
        clock: &dyn Clock,
        sink: &mut dyn CommandSink,
    ) {
        match command {
            ScriptCommand::Yield => {
                self.slots[index].run_flag = false;
                return;
            }
            // An ambient wait is its own cooldown.
            ScriptCommand::Wait { ticks } => {
                let now = clock.now_millis();
                self.slots[index].next_run_at = now + ticks as u64 * self.tick_length_ms;
                self.slots[index].run_flag = false;
                return;
            }
            _ => {}
        }
        let reply = match self.apply_control(&command, clock.now_millis()) {
            Some(Ok(reply)) => reply,
            Some(Err(fault)) => {
                sink.fault(CommandOrigin::Ambient(index), &command, fault);
                None
            }
            None => sink.dispatch(CommandOrigin::Ambient(index), command),
        };
        if let Some(value) = reply {
            vm.set_reply(context, value);
        }
    }
}
