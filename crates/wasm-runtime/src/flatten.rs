//! The one-time lowering pass of §4.5.1: structured `block`/`loop`/`if` nest
//! into paired markers carrying precomputed jump targets, so `br`/`return` at
//! run time are O(1) index operations instead of tree walks.

use wasm_module::Instr;

/// An instruction in the flattened stream. `Plain` carries every
/// non-recursive `Instr` variant verbatim (everything except `Block`,
/// `Loop`, and `If`, which this pass rewrites into the marker variants
/// below); `Goto` is a purely internal bookkeeping instruction with no
/// surface-syntax counterpart, used to skip an `if`'s else-arm when the
/// then-arm was taken.
#[derive(Debug, Clone, PartialEq)]
pub enum FlatInstr {
    Plain(Instr),
    /// Pushed on entering a `block` or `loop`. `continuation_ip` is the
    /// branch target for this block's label: the instruction after the
    /// matching `EndBlock` for `block`, or the instruction right after this
    /// `StartBlock` for `loop` (§4.5.1's continuation-address rule). `is_loop`
    /// tells the engine whether a branch to this label should re-enter it
    /// (loop) or pop it (block).
    StartBlock {
        arity: u8,
        continuation_ip: usize,
        is_loop: bool,
    },
    /// Pushed on entering an `if`. Pops the i32 condition; on falsy, jumps to
    /// `else_ip`; on truthy, falls through into the then-arm. The merge
    /// label's continuation is `end_ip` (the instruction after the `if`'s
    /// final `EndBlock`).
    StartIf {
        arity: u8,
        else_ip: usize,
        end_ip: usize,
    },
    /// Normal (non-branch) exit from a block/loop/if: pops the current
    /// label and falls through.
    EndBlock,
    /// Internal-only unconditional jump.
    Goto(usize),
}

/// Flattens a function body, appending an implicit `return` so falling off
/// the end of the body behaves exactly like an explicit `return` instruction
/// (the function itself is not wrapped in its own label/block).
pub fn flatten_function_body(body: &[Instr]) -> Vec<FlatInstr> {
    let mut out = Vec::new();
    flatten_into(body, &mut out);
    out.push(FlatInstr::Plain(Instr::Return));
    out
}

fn flatten_into(instrs: &[Instr], out: &mut Vec<FlatInstr>) {
    for instr in instrs {
        match instr {
            Instr::Block(rt, body) => {
                let start_ip = out.len();
                out.push(FlatInstr::StartBlock {
                    arity: rt.is_some() as u8,
                    continuation_ip: 0, // patched below
                    is_loop: false,
                });
                flatten_into(body, out);
                out.push(FlatInstr::EndBlock);
                let continuation_ip = out.len();
                patch_block_continuation(out, start_ip, continuation_ip);
            }
            Instr::Loop(rt, body) => {
                let start_ip = out.len();
                let continuation_ip = start_ip + 1;
                out.push(FlatInstr::StartBlock {
                    arity: rt.is_some() as u8,
                    continuation_ip,
                    is_loop: true,
                });
                flatten_into(body, out);
                out.push(FlatInstr::EndBlock);
            }
            Instr::If(rt, then_body, else_body) => {
                let start_ip = out.len();
                out.push(FlatInstr::StartIf {
                    arity: rt.is_some() as u8,
                    else_ip: 0,
                    end_ip: 0,
                });
                flatten_into(then_body, out);
                let goto_ip = out.len();
                out.push(FlatInstr::Goto(0)); // patched below, skips the else-arm
                let else_ip = out.len();
                flatten_into(else_body, out);
                out.push(FlatInstr::EndBlock);
                let end_ip = out.len();

                if let FlatInstr::StartIf {
                    else_ip: e, end_ip: d, ..
                } = &mut out[start_ip]
                {
                    *e = else_ip;
                    *d = end_ip;
                }
                if let FlatInstr::Goto(target) = &mut out[goto_ip] {
                    *target = end_ip;
                }
            }
            other => out.push(FlatInstr::Plain(other.clone())),
        }
    }
}

fn patch_block_continuation(out: &mut [FlatInstr], start_ip: usize, continuation_ip: usize) {
    if let FlatInstr::StartBlock {
        continuation_ip: c, ..
    } = &mut out[start_ip]
    {
        *c = continuation_ip;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_module::Instr;

    #[test]
    fn plain_instructions_pass_through() {
        let flat = flatten_function_body(&[Instr::I32Const(1), Instr::I32Const(2), Instr::I32Add]);
        assert_eq!(
            flat,
            vec![
                FlatInstr::Plain(Instr::I32Const(1)),
                FlatInstr::Plain(Instr::I32Const(2)),
                FlatInstr::Plain(Instr::I32Add),
                FlatInstr::Plain(Instr::Return),
            ]
        );
    }

    #[test]
    fn block_continuation_points_after_end() {
        let flat = flatten_function_body(&[Instr::Block(None, vec![Instr::Nop]), Instr::Nop]);
        match &flat[0] {
            FlatInstr::StartBlock { continuation_ip, .. } => assert_eq!(*continuation_ip, 3),
            other => panic!("expected StartBlock, got {other:?}"),
        }
    }

    #[test]
    fn loop_continuation_points_at_body_start() {
        let flat = flatten_function_body(&[Instr::Loop(None, vec![Instr::Nop])]);
        match &flat[0] {
            FlatInstr::StartBlock {
                continuation_ip,
                is_loop,
                ..
            } => {
                assert_eq!(*continuation_ip, 1);
                assert!(*is_loop);
            }
            other => panic!("expected StartBlock, got {other:?}"),
        }
    }

    #[test]
    fn block_is_not_marked_as_loop() {
        let flat = flatten_function_body(&[Instr::Block(None, vec![Instr::Nop])]);
        match &flat[0] {
            FlatInstr::StartBlock { is_loop, .. } => assert!(!*is_loop),
            other => panic!("expected StartBlock, got {other:?}"),
        }
    }

    #[test]
    fn if_else_wires_else_ip_and_end_ip() {
        let flat = flatten_function_body(&[Instr::If(
            None,
            vec![Instr::Nop],
            vec![Instr::Nop, Instr::Nop],
        )]);
        // [0] StartIf, [1] Nop, [2] Goto, [3] Nop, [4] Nop, [5] EndBlock, [6] Return
        match &flat[0] {
            FlatInstr::StartIf {
                else_ip, end_ip, ..
            } => {
                assert_eq!(*else_ip, 3);
                assert_eq!(*end_ip, 6);
            }
            other => panic!("expected StartIf, got {other:?}"),
        }
        assert_eq!(flat[2], FlatInstr::Goto(6));
        assert_eq!(flat[5], FlatInstr::EndBlock);
    }
}
