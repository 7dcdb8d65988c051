//! The iterative-scan linear register allocator.
//!
//! A direct port of `original_source/lib/CodeGen/RegAllocIterativeScan.cpp`'s
//! `RA::linearScan`: intervals sorted by start point are handled in order,
//! kept in `active_`/`inactive_` lists that are reshuffled as the current
//! point advances, and assigned either a free physical register or made to
//! spill something. `crate::regalloc` drives the outer iterate-until-no-
//! spills loop described in that file's `runOnMachineFunction` (spill,
//! rewrite, rebuild intervals, try again); this module is just one pass of
//! `linearScan()` over the intervals it's handed.

use crate::isa::registers::{PhysReg, RegClassIndex, RegInfo};
use crate::isa::registers::Reg;
use crate::live::LiveInterval;
use crate::regalloc::tracker::PhysRegTracker;
use crate::vreg::VirtRegs;
use std::collections::HashMap;

/// Outcome of one linear-scan pass.
pub struct LinearScanResult {
    /// Physical register assigned to each virtual register that got one.
    pub assignments: HashMap<Reg, PhysReg>,
    /// Virtual registers that could not be assigned a register and must be
    /// spilled before another pass is attempted.
    pub spilled: Vec<Reg>,
}

struct Active {
    interval: LiveInterval,
    phys: PhysReg,
}

/// Run one linear-scan pass over `virtuals` (sorted by interval start) and
/// `fixed` physical-register intervals (calls, ABI-fixed defs).
pub fn linear_scan(
    reg_info: &RegInfo,
    vregs: &VirtRegs,
    virtuals: Vec<LiveInterval>,
    fixed: Vec<LiveInterval>,
) -> LinearScanResult {
    let mut unhandled: Vec<LiveInterval> = virtuals;
    unhandled.sort_by_key(|i| i.start());
    let mut fixed_remaining: Vec<LiveInterval> = fixed;
    fixed_remaining.sort_by_key(|i| i.start());

    let mut active: Vec<Active> = Vec::new();
    let mut inactive: Vec<Active> = Vec::new();
    let mut tracker = PhysRegTracker::new(reg_info);
    let mut assignments: HashMap<Reg, PhysReg> = HashMap::new();
    let mut spilled: Vec<Reg> = Vec::new();

    let mut fixed_idx = 0;

    while !unhandled.is_empty() || fixed_idx < fixed_remaining.len() {
        let next_is_fixed = match unhandled.first() {
            Some(v) => fixed_idx < fixed_remaining.len()
                && fixed_remaining[fixed_idx].start() <= v.start(),
            None => fixed_idx < fixed_remaining.len(),
        };

        let cur_start;
        if next_is_fixed {
            cur_start = fixed_remaining[fixed_idx].start();
        } else {
            cur_start = unhandled[0].start();
        }

        process_active_intervals(cur_start, &mut active, &mut inactive, reg_info, &mut tracker);
        process_inactive_intervals(cur_start, &mut active, &mut inactive, reg_info, &mut tracker);

        if next_is_fixed {
            let cur = fixed_remaining[fixed_idx].clone();
            fixed_idx += 1;
            let phys = cur.reg.as_phys();
            tracker.add_reg_use(reg_info, phys);
            active.push(Active { interval: cur, phys });
        } else {
            let cur = unhandled.remove(0);
            assign_reg_or_spill_at_interval(
                reg_info,
                vregs,
                cur,
                &mut active,
                &mut inactive,
                &fixed_remaining[fixed_idx..],
                &mut tracker,
                &mut assignments,
                &mut spilled,
            );
        }
    }

    LinearScanResult {
        assignments,
        spilled,
    }
}

fn process_active_intervals(
    cur_start: crate::live::Slot,
    active: &mut Vec<Active>,
    inactive: &mut Vec<Active>,
    reg_info: &RegInfo,
    tracker: &mut PhysRegTracker,
) {
    let mut i = 0;
    while i < active.len() {
        if active[i].interval.expired_at(cur_start) {
            let a = active.remove(i);
            tracker.delete_reg_use(reg_info, a.phys);
        } else if !active[i].interval.live_at(cur_start) {
            let a = active.remove(i);
            tracker.delete_reg_use(reg_info, a.phys);
            inactive.push(a);
        } else {
            i += 1;
        }
    }
}

fn process_inactive_intervals(
    cur_start: crate::live::Slot,
    active: &mut Vec<Active>,
    inactive: &mut Vec<Active>,
    reg_info: &RegInfo,
    tracker: &mut PhysRegTracker,
) {
    let mut i = 0;
    while i < inactive.len() {
        if inactive[i].interval.expired_at(cur_start) {
            inactive.remove(i);
        } else if inactive[i].interval.live_at(cur_start) {
            let a = inactive.remove(i);
            tracker.add_reg_use(reg_info, a.phys);
            active.push(a);
        } else {
            i += 1;
        }
    }
}

/// First free register of `rc`'s preferred order, or `None` if all are in
/// use. Mirrors `getFreePhysReg`.
fn get_free_phys_reg(rc: crate::isa::registers::RegClass, tracker: &PhysRegTracker) -> Option<PhysReg> {
    rc.registers.iter().copied().find(|&r| tracker.is_reg_avail(r))
}

#[allow(clippy::too_many_arguments)]
fn assign_reg_or_spill_at_interval(
    reg_info: &RegInfo,
    vregs: &VirtRegs,
    cur: LiveInterval,
    active: &mut Vec<Active>,
    inactive: &mut Vec<Active>,
    remaining_fixed: &[LiveInterval],
    tracker: &mut PhysRegTracker,
    assignments: &mut HashMap<Reg, PhysReg>,
    spilled: &mut Vec<Reg>,
) {
    let rc_index: RegClassIndex = vregs.class_of(reg_info, cur.reg);
    let rc = reg_info.rc(rc_index);

    // Temporarily mark registers busy for every inactive or not-yet-reached
    // fixed interval `cur` overlaps, so a register a later call will clobber
    // never looks free just because nothing has activated it yet, then
    // restore the tracker. Mirrors the backup/restore of `PhysRegTracker`
    // around `getFreePhysReg` in `assignRegOrSpillAtInterval`.
    let mut temp_marked: Vec<PhysReg> = Vec::new();
    for a in inactive.iter() {
        if a.interval.overlaps(&cur) {
            tracker.add_reg_use(reg_info, a.phys);
            temp_marked.push(a.phys);
        }
    }
    for f in remaining_fixed.iter() {
        if f.overlaps(&cur) {
            tracker.add_reg_use(reg_info, f.reg.as_phys());
            temp_marked.push(f.reg.as_phys());
        }
    }
    let free = get_free_phys_reg(rc, tracker);
    for phys in &temp_marked {
        tracker.delete_reg_use(reg_info, *phys);
    }

    if let Some(phys) = free {
        tracker.add_reg_use(reg_info, phys);
        assignments.insert(cur.reg, phys);
        active.push(Active { interval: cur, phys });
        return;
    }

    let mut weights: HashMap<PhysReg, f32> = HashMap::new();
    for r in rc.registers {
        weights.insert(*r, 0.0);
    }
    for a in active.iter() {
        accumulate_weight(reg_info, &mut weights, a.phys, a.interval.weight);
    }
    for a in inactive.iter() {
        if a.interval.overlaps(&cur) {
            accumulate_weight(reg_info, &mut weights, a.phys, a.interval.weight);
        }
    }
    for f in remaining_fixed.iter() {
        if f.overlaps(&cur) {
            accumulate_weight(reg_info, &mut weights, f.reg.as_phys(), f.weight);
        }
    }

    let (&min_reg, &min_weight) = weights
        .iter()
        .min_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        .expect("register class must be non-empty");

    if cur.weight <= min_weight {
        spilled.push(cur.reg);
        return;
    }

    let mut to_spill: Vec<Reg> = Vec::new();
    active.retain(|a| {
        if (a.phys == min_reg || reg_info.aliases(a.phys).contains(&min_reg)) && a.interval.overlaps(&cur)
        {
            to_spill.push(a.interval.reg);
            false
        } else {
            true
        }
    });
    inactive.retain(|a| {
        if (a.phys == min_reg || reg_info.aliases(a.phys).contains(&min_reg)) && a.interval.overlaps(&cur)
        {
            to_spill.push(a.interval.reg);
            false
        } else {
            true
        }
    });

    for reg in &to_spill {
        if let Some(phys) = assignments.remove(reg) {
            tracker.delete_reg_use(reg_info, phys);
        }
        spilled.push(*reg);
    }

    tracker.add_reg_use(reg_info, min_reg);
    assignments.insert(cur.reg, min_reg);
    active.push(Active {
        interval: cur,
        phys: min_reg,
    });
}

fn accumulate_weight(reg_info: &RegInfo, weights: &mut HashMap<PhysReg, f32>, phys: PhysReg, weight: f32) {
    if let Some(w) = weights.get_mut(&phys) {
        *w += weight;
    }
    for alias in reg_info.aliases(phys) {
        if let Some(w) = weights.get_mut(alias) {
            *w += weight;
        }
    }
}
