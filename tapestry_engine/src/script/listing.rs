use std::collections::BTreeMap;

use serde::Deserialize;
use tapestry_assets::ProgramImage;

use super::{
    CommandQueue, ProgramId, ProgramLoadError, ScriptCommand, ScriptContext, ScriptInterpreter,
    REGISTER_COUNT,
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ControlOp {
    Nop,
    Stop,
    Jump { target: usize },
    /// Branches on the reply of the most recent query command.
    JumpIfZero { target: usize },
    JumpIfNonzero { target: usize },
    SetReg { reg: usize, value: i32 },
    AddReg { reg: usize, value: i32 },
    JumpIfRegBelow { reg: usize, value: i32, target: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Instruction {
    Control(ControlOp),
    Command(ScriptCommand),
}

/// A program as a table of entry points, each a flat instruction list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Listing {
    #[serde(default)]
    pub name: String,
    pub entry_points: BTreeMap<u16, Vec<Instruction>>,
}

impl Listing {
    pub fn entry(&self, entry: u16) -> Option<&[Instruction]> {
        self.entry_points.get(&entry).map(Vec::as_slice)
    }

    fn validate(&self) -> Result<(), String> {
        for (entry, code) in &self.entry_points {
            for (offset, instruction) in code.iter().enumerate() {
                let Instruction::Control(op) = instruction else {
                    continue;
                };
                let (target, reg) = match *op {
                    ControlOp::Jump { target }
                    | ControlOp::JumpIfZero { target }
                    | ControlOp::JumpIfNonzero { target } => (Some(target), None),
                    ControlOp::SetReg { reg, .. } | ControlOp::AddReg { reg, .. } => {
                        (None, Some(reg))
                    }
                    ControlOp::JumpIfRegBelow { reg, target, .. } => (Some(target), Some(reg)),
                    ControlOp::Nop | ControlOp::Stop => (None, None),
                };
                if let Some(target) = target.filter(|target| *target >= code.len()) {
                    return Err(format!(
                        "entry {entry} offset {offset} jumps to {target} past {} instructions",
                        code.len()
                    ));
                }
                if let Some(reg) = reg.filter(|reg| *reg >= REGISTER_COUNT) {
                    return Err(format!("entry {entry} offset {offset} uses register {reg}"));
                }
            }
        }
        Ok(())
    }
}

/// Reference interpreter for JSON listings. Each step executes exactly one
/// instruction; commands are forwarded verbatim to the engine.
#[derive(Debug, Default)]
pub struct ListingInterpreter {
    next_id: u32,
    programs: BTreeMap<ProgramId, Listing>,
}

impl ListingInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loaded_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn load_listing(&mut self, listing: Listing) -> Result<ProgramId, ProgramLoadError> {
        listing
            .validate()
            .map_err(|reason| ProgramLoadError { reason })?;
        self.next_id = self.next_id.wrapping_add(1);
        let id = ProgramId(self.next_id);
        self.programs.insert(id, listing);
        Ok(id)
    }
}

impl ScriptInterpreter for ListingInterpreter {
    fn load_program(&mut self, image: &ProgramImage) -> Result<ProgramId, ProgramLoadError> {
        let mut listing: Listing =
            serde_json::from_slice(&image.bytes).map_err(|err| ProgramLoadError {
                reason: err.to_string(),
            })?;
        if listing.name.is_empty() {
            listing.name = image.name.clone();
        }
        self.load_listing(listing)
    }

    fn release_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
    }

    fn init_context(&mut self, ctx: &mut ScriptContext, program: ProgramId) {
        ctx.program = Some(program);
        ctx.entry = None;
        ctx.ip = None;
        ctx.regs = [0; REGISTER_COUNT];
        ctx.reply = 0;
    }

    fn start_entry_point(&mut self, ctx: &mut ScriptContext, entry: u16) -> bool {
        let has_code = ctx
            .program
            .and_then(|program| self.programs.get(&program))
            .and_then(|listing| listing.entry(entry))
            .map(|code| !code.is_empty())
            .unwrap_or(false);
        ctx.entry = Some(entry);
        ctx.reply = 0;
        ctx.ip = has_code.then_some(0);
        has_code
    }

    fn step_one(&mut self, ctx: &mut ScriptContext, out: &mut CommandQueue) -> bool {
        let code = match (ctx.program, ctx.entry, ctx.ip) {
            (Some(program), Some(entry), Some(_)) => self
                .programs
                .get(&program)
                .and_then(|listing| listing.entry(entry)),
            _ => None,
        };
        let (Some(code), Some(ip)) = (code, ctx.ip) else {
            ctx.ip = None;
            return false;
        };
        let Some(instruction) = code.get(ip) else {
            ctx.ip = None;
            return false;
        };

        ctx.steps += 1;
        let mut next = ip + 1;
        match instruction {
            Instruction::Command(command) => out.push(command.clone()),
            Instruction::Control(op) => match *op {
                ControlOp::Nop => {}
                ControlOp::Stop => {
                    ctx.ip = None;
                    return false;
                }
                ControlOp::Jump { target } => next = target,
                ControlOp::JumpIfZero { target } => {
                    if ctx.reply == 0 {
                        next = target;
                    }
                }
                ControlOp::JumpIfNonzero { target } => {
                    if ctx.reply != 0 {
                        next = target;
                    }
                }
                ControlOp::SetReg { reg, value } => ctx.regs[reg] = value,
                ControlOp::AddReg { reg, value } => {
                    ctx.regs[reg] = ctx.regs[reg].wrapping_add(value)
                }
                ControlOp::JumpIfRegBelow { reg, value, target } => {
                    if ctx.regs[reg] < value {
                        next = target;
                    }
                }
            },
        }

        if next >= code.len() {
            ctx.ip = None;
            false
        } else {
            ctx.ip = Some(next);
            true
        }
    }

    fn is_valid(&self, ctx: &ScriptContext) -> bool {
        ctx.ip.is_some()
            && ctx
                .program
                .map(|program| self.programs.contains_key(&program))
                .unwrap_or(false)
    }

    fn unload(&mut self, ctx: &mut ScriptContext) {
        ctx.program = None;
        ctx.entry = None;
        ctx.ip = None;
        ctx.regs = [0; REGISTER_COUNT];
        ctx.reply = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(json: &str) -> ProgramImage {
        ProgramImage {
            name: "test.emc".to_string(),
            bytes: json.as_bytes().to_vec(),
        }
    }

    fn drain(queue: &mut CommandQueue) -> Vec<ScriptCommand> {
        std::iter::from_fn(|| queue.pop()).collect()
    }

    #[test]
    fn steps_commands_until_the_entry_ends() {
        let mut vm = ListingInterpreter::new();
        let program = vm
            .load_program(&image(
                r#"{"entry_points": {"0": [
                    {"op": "set_scene_flags", "flags": 3},
                    {"op": "yield"}
                ]}}"#,
            ))
            .expect("load");
        let mut ctx = ScriptContext::new("main");
        vm.init_context(&mut ctx, program);
        assert!(vm.start_entry_point(&mut ctx, 0));

        let mut queue = CommandQueue::new();
        assert!(vm.step_one(&mut ctx, &mut queue));
        assert!(!vm.step_one(&mut ctx, &mut queue));
        assert!(!vm.is_valid(&ctx));
        assert_eq!(
            drain(&mut queue),
            vec![ScriptCommand::SetSceneFlags { flags: 3 }, ScriptCommand::Yield]
        );
    }

    #[test]
    fn branches_on_query_replies() {
        let mut vm = ListingInterpreter::new();
        let program = vm
            .load_program(&image(
                r#"{"entry_points": {"9": [
                    {"op": "query_suspended", "slot": 1},
                    {"op": "jump_if_nonzero", "target": 3},
                    {"op": "play_sfx", "sound": 1},
                    {"op": "play_sfx", "sound": 2}
                ]}}"#,
            ))
            .expect("load");
        let mut ctx = ScriptContext::new("ambient");
        vm.init_context(&mut ctx, program);
        vm.start_entry_point(&mut ctx, 9);

        let mut queue = CommandQueue::new();
        vm.step_one(&mut ctx, &mut queue);
        vm.set_reply(&mut ctx, 1);
        vm.step_one(&mut ctx, &mut queue);
        vm.step_one(&mut ctx, &mut queue);
        assert_eq!(
            drain(&mut queue),
            vec![
                ScriptCommand::QuerySuspended { slot: 1 },
                ScriptCommand::PlaySfx { sound: 2 }
            ]
        );
    }

    #[test]
    fn register_loops_terminate() {
        let mut vm = ListingInterpreter::new();
        let program = vm
            .load_program(&image(
                r#"{"entry_points": {"0": [
                    {"op": "add_reg", "reg": 0, "value": 1},
                    {"op": "jump_if_reg_below", "reg": 0, "value": 3, "target": 0}
                ]}}"#,
            ))
            .expect("load");
        let mut ctx = ScriptContext::new("loop");
        vm.init_context(&mut ctx, program);
        vm.start_entry_point(&mut ctx, 0);
        let mut queue = CommandQueue::new();
        let mut steps = 0;
        while vm.step_one(&mut ctx, &mut queue) {
            steps += 1;
        }
        assert_eq!(ctx.regs[0], 3);
        assert_eq!(steps, 5);
    }

    #[test]
    fn missing_entries_and_bad_jumps_are_reported() {
        let mut vm = ListingInterpreter::new();
        let err = vm
            .load_program(&image(
                r#"{"entry_points": {"0": [{"op": "jump", "target": 4}]}}"#,
            ))
            .expect_err("jump past end");
        assert!(err.reason.contains("jumps to 4"), "{}", err.reason);

        let program = vm
            .load_program(&image(r#"{"entry_points": {"0": [{"op": "nop"}]}}"#))
            .expect("load");
        let mut ctx = ScriptContext::new("main");
        vm.init_context(&mut ctx, program);
        assert!(!vm.start_entry_point(&mut ctx, 12));
        assert!(!vm.is_valid(&ctx));

        vm.start_entry_point(&mut ctx, 0);
        vm.release_program(program);
        assert!(!vm.is_valid(&ctx));
    }
}
