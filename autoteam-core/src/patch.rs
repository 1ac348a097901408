use log::{debug, info};
use thiserror::Error;

use crate::memory::{MemoryAccess, MemoryError, MemorySession};
use crate::roster::{Player, Team, TEAM_SIZE};

/// Gecko codes that must be active in Dolphin for the hook to be reached.
pub const PREREQUISITE_GECKO_CODES: [&str; 3] = [
    "040802b4 60000000",
    "040802b8 60000000",
    "0406aed8 48000b80",
];

/// Errors that can occur while assembling the lineup patch block.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("{team} team has {found} players; the patch block is laid out for {expected}")]
    WrongTeamSize {
        team: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("value {value:#X} does not fit the {kind} operand")]
    ValueOutOfRange { value: u32, kind: &'static str },

    #[error("batting slot chain for player {player} does not settle; duplicate batting orders?")]
    SlotChain { player: usize },
}

/// Instruction templates. Operands are added into the low bits.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Opcodes {
    /// Gecko `C2` insert-asm header for the hook address.
    pub code_header: u32,
    /// `nop`
    pub nop: u32,
    /// `cmpwi r14, 1`: which team the current pass fills.
    pub compare_pass: u32,
    /// `beq` over the away block to the home block.
    pub branch_to_home: u32,
    /// `li r15, imm`
    pub load_immediate: u32,
    /// `stb r15, 0x01(r3)`: character byte of lineup slot 0.
    pub store_character: u32,
    /// `stb r15, 0x0C(r3)`: fielding byte of lineup slot 0.
    pub store_fielding: u32,
    /// Distance between consecutive lineup slots.
    pub slot_stride: u32,
    /// `li r14, 1` after the away block.
    pub mark_away_done: u32,
    /// `b` over the home block.
    pub skip_home: u32,
    /// `li r14, 0` after the home block.
    pub mark_home_done: u32,
    /// Unconditional relative branch with zero displacement.
    pub branch: u32,
}

/// Memory layout of the patched client.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PatchTarget {
    pub hook_address: u32,
    pub hook_word: u32,
    pub patch_base: u32,
    /// Second header word; holds the code's line count.
    pub line_count_address: u32,
    /// Instruction after the hook, where the block returns.
    pub return_address: u32,
    pub opcodes: Opcodes,
}

impl PatchTarget {
    /// Mario Super Sluggers (NTSC-U).
    pub const MSS: PatchTarget = PatchTarget {
        hook_address: 0x8006_AED4,
        hook_word: 0x4BF9_7324,
        patch_base: 0x8000_21F0,
        line_count_address: 0x8000_21F4,
        return_address: 0x8006_AED8,
        opcodes: Opcodes {
            code_header: 0xC206_AED4,
            nop: 0x6000_0000,
            compare_pass: 0x2C0E_0001,
            branch_to_home: 0x4182_009C,
            load_immediate: 0x39E0_0000,
            store_character: 0x99E3_0001,
            store_fielding: 0x99E3_000C,
            slot_stride: 0x10,
            mark_away_done: 0x39C0_0001,
            skip_home: 0x4800_0098,
            mark_home_done: 0x39C0_0000,
            branch: 0x4800_0000,
        },
    };
}

impl Default for PatchTarget {
    fn default() -> Self {
        PatchTarget::MSS
    }
}

/// Relative branch from `from` to `to`.
pub fn encode_branch(from: u32, to: u32, branch: u32) -> u32 {
    (to.wrapping_sub(from) & 0x03FF_FFFC) | branch
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PatchEntry {
    pub address: u32,
    pub word: u32,
}

/// Everything one run writes for the lineup patch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PatchProgram {
    pub hook: PatchEntry,
    /// Header and instructions, contiguous from the patch base.
    pub body: Vec<PatchEntry>,
    pub line_count: PatchEntry,
    /// Instructions emitted after the two header words.
    pub instruction_count: u32,
}

impl PatchProgram {
    /// Writes in the order they are applied: hook, body, line count.
    pub fn writes(&self) -> impl Iterator<Item = &PatchEntry> {
        std::iter::once(&self.hook)
            .chain(self.body.iter())
            .chain(std::iter::once(&self.line_count))
    }

    pub fn apply<M: MemoryAccess + ?Sized>(&self, mem: &mut M) -> Result<(), MemoryError> {
        info!(
            "writing patch block: {} instructions at 0x{:08X}",
            self.instruction_count,
            self.body.first().map_or(0, |e| e.address)
        );
        let mut session = MemorySession::open(mem)?;
        for entry in self.writes() {
            session.write_word(entry.address, entry.word)?;
        }
        session.finish()
    }
}

/// Where the patch block puts a player in the pre-fix-up lineup.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SlotPlacement {
    /// Only the fielding byte is written; the Mii itself is chosen in the
    /// selector and moved later by the batting order fix-up.
    Mii { slot: u8 },
    Fixed { slot: u8 },
}

impl SlotPlacement {
    pub fn slot(self) -> u8 {
        match self {
            SlotPlacement::Mii { slot } | SlotPlacement::Fixed { slot } => slot,
        }
    }
}

/// Lineup slot for each player, in roster order.
///
/// Miis take slots `1..=n` in roster order. A fixed character whose batting
/// order lands on one of those slots follows the Mii that will be swapped
/// out of it, repeatedly, so that after the fix-up swaps it ends up on its
/// own batting order.
pub fn lineup_slots(team: &Team) -> Result<Vec<SlotPlacement>, PatchError> {
    let miis = team.miis();
    let mut next_mii = 1u8;
    let mut out = Vec::with_capacity(team.len());

    for (idx, p) in team.iter().enumerate() {
        if p.is_mii() {
            out.push(SlotPlacement::Mii { slot: next_mii });
            next_mii += 1;
            continue;
        }

        let mut pos = usize::from(p.batting_order);
        let mut hops = 0;
        while pos > 0 && pos <= miis.len() {
            pos = usize::from(miis[pos - 1].batting_order);
            hops += 1;
            if hops > TEAM_SIZE {
                return Err(PatchError::SlotChain { player: idx + 1 });
            }
        }
        out.push(SlotPlacement::Fixed { slot: pos as u8 });
    }

    Ok(out)
}

struct Assembler<'a> {
    ops: &'a Opcodes,
    cur: u32,
    body: Vec<PatchEntry>,
    count: u32,
}

impl<'a> Assembler<'a> {
    fn raw(&mut self, word: u32) {
        self.body.push(PatchEntry {
            address: self.cur,
            word,
        });
        self.cur = self.cur.wrapping_add(4);
    }

    fn emit(&mut self, word: u32) {
        self.raw(word);
        self.count += 1;
    }

    fn load(&mut self, value: u32) -> Result<(), PatchError> {
        if value > 0xFFFF {
            return Err(PatchError::ValueOutOfRange {
                value,
                kind: "load immediate",
            });
        }
        self.emit(self.ops.load_immediate + value);
        Ok(())
    }

    fn store(&mut self, template: u32, slot: u8) -> Result<(), PatchError> {
        let offset = u32::from(slot) * self.ops.slot_stride;
        if (template & 0xFFFF) + offset > 0x7FFF {
            return Err(PatchError::ValueOutOfRange {
                value: offset,
                kind: "store displacement",
            });
        }
        self.emit(template + offset);
        Ok(())
    }

    fn team(&mut self, label: &'static str, team: &Team) -> Result<(), PatchError> {
        if team.len() != TEAM_SIZE {
            return Err(PatchError::WrongTeamSize {
                team: label,
                expected: TEAM_SIZE,
                found: team.len(),
            });
        }

        debug!("{} team:", label);
        let slots = lineup_slots(team)?;
        for (p, placement) in team.iter().zip(slots) {
            self.player(p, placement)?;
        }
        Ok(())
    }

    fn player(&mut self, p: &Player, placement: SlotPlacement) -> Result<(), PatchError> {
        let fielding = u32::from(p.fielding_position);
        match placement {
            SlotPlacement::Mii { slot } => {
                debug!("  mii: slot = {}, fielding = {}", slot, fielding);
                self.emit(self.ops.nop);
                self.emit(self.ops.nop);
                self.load(fielding)?;
                self.store(self.ops.store_fielding, slot)?;
            }
            SlotPlacement::Fixed { slot } => {
                debug!(
                    "  character {}: batting = {}, slot = {}, fielding = {}",
                    p.character_id, p.batting_order, slot, fielding
                );
                self.load(u32::from(p.character_id))?;
                self.store(self.ops.store_character, slot)?;
                self.load(fielding)?;
                self.store(self.ops.store_fielding, slot)?;
            }
        }
        Ok(())
    }
}

/// Assemble the lineup patch for both teams.
///
/// Layout, from the patch base:
///
/// - Gecko `C2` header word and the line-count word (not counted).
/// - `cmpwi r14, 1` / `beq home`: the client runs the block once per team.
/// - Away block: four words per player in roster order.
///   Fixed characters: `li` character, `stb` to the slot's character byte,
///   `li` fielding, `stb` to the slot's fielding byte.
///   Miis: two `nop`s, `li` fielding, `stb` fielding.
/// - `li r14, 1` / `b` over the home block.
/// - Home block, then `li r14, 0`.
/// - `nop` padding until the count is 3 mod 4, then a branch back to the
///   instruction after the hook.
///
/// The line count (half the instruction count) goes to the second header
/// word; the hook word redirects the client into the block.
pub fn compile(away: &Team, home: &Team, target: &PatchTarget) -> Result<PatchProgram, PatchError> {
    let ops = &target.opcodes;
    let mut asm = Assembler {
        ops,
        cur: target.patch_base,
        body: Vec::new(),
        count: 0,
    };

    asm.raw(ops.code_header);
    asm.raw(0);

    asm.emit(ops.compare_pass);
    asm.emit(ops.branch_to_home);

    asm.team("Away", away)?;
    asm.emit(ops.mark_away_done);
    asm.emit(ops.skip_home);

    asm.team("Home", home)?;
    asm.emit(ops.mark_home_done);

    while asm.count % 4 != 3 {
        asm.emit(ops.nop);
    }

    let back = encode_branch(asm.cur, target.return_address, ops.branch);
    asm.emit(back);

    Ok(PatchProgram {
        hook: PatchEntry {
            address: target.hook_address,
            word: target.hook_word,
        },
        line_count: PatchEntry {
            address: target.line_count_address,
            word: asm.count / 2,
        },
        instruction_count: asm.count,
        body: asm.body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryWrite, RecordingMemory};
    use crate::roster::straight_team;

    fn word_at(program: &PatchProgram, address: u32) -> u32 {
        program
            .body
            .iter()
            .find(|e| e.address == address)
            .map(|e| e.word)
            .unwrap()
    }

    #[test]
    fn hook_branches_to_first_instruction() {
        let t = PatchTarget::MSS;
        assert_eq!(
            encode_branch(t.hook_address, t.patch_base + 8, t.opcodes.branch),
            t.hook_word
        );
    }

    #[test]
    fn branch_over_away_block_lands_on_home_block() {
        // beq sits at base + 0x0C; home block starts after 2 + 36 + 2 words.
        let t = PatchTarget::MSS;
        let beq_at = t.patch_base + 0x0C;
        let home_at = t.patch_base + 8 + 4 * (2 + 36 + 2);
        assert_eq!(beq_at + (t.opcodes.branch_to_home & 0xFFFC), home_at);
    }

    #[test]
    fn mii_free_teams() {
        let away = straight_team(9);
        let home = straight_team(4);
        let p = compile(&away, &home, &PatchTarget::MSS).unwrap();

        // 2 + 36 + 2 + 36 + 1 = 77, padded to 79, plus the return branch.
        assert_eq!(p.instruction_count, 80);
        assert_eq!(p.line_count.word, 40);
        assert_eq!(p.line_count.address, 0x8000_21F4);
        assert_eq!(p.body.len(), 82);

        let away_block: Vec<u32> = p.body[4..4 + 36].iter().map(|e| e.word).collect();
        assert_eq!(&away_block[..4], &[0x39E0_0009, 0x99E3_0001, 0x39E0_0000, 0x99E3_000C]);
        assert_eq!(&away_block[32..], &[0x39E0_0009, 0x99E3_0081, 0x39E0_0008, 0x99E3_008C]);
        assert_eq!(word_at(&p, 0x8000_2290), 0x39C0_0001);
        assert_eq!(word_at(&p, 0x8000_2294), 0x4800_0098);
        assert_eq!(word_at(&p, 0x8000_2298), 0x39E0_0004);
        assert_eq!(word_at(&p, 0x8000_2328), 0x39C0_0000);
        assert_eq!(word_at(&p, 0x8000_232C), 0x6000_0000);
        assert_eq!(word_at(&p, 0x8000_2330), 0x6000_0000);

        let last = p.body.last().unwrap();
        assert_eq!(last.address, 0x8000_2334);
        assert_eq!(last.word, 0x4806_8BA4);
        assert_eq!(last.address + (last.word & 0x03FF_FFFC), 0x8006_AED8);
    }

    #[test]
    fn mii_slots_skip_batting_and_use_running_counter() {
        let mut away = straight_team(0);
        away.players[0] = Player::new(80, 2, 0);
        away.players[1] = Player::new(81, 0, 1);
        away.players[2] = Player::new(82, 1, 2);
        let p = compile(&away, &straight_team(1), &PatchTarget::MSS).unwrap();

        let words: Vec<u32> = p.body[4..16].iter().map(|e| e.word).collect();
        assert_eq!(
            words,
            vec![
                0x6000_0000, 0x6000_0000, 0x39E0_0000, 0x99E3_001C,
                0x6000_0000, 0x6000_0000, 0x39E0_0001, 0x99E3_002C,
                0x6000_0000, 0x6000_0000, 0x39E0_0002, 0x99E3_003C,
            ]
        );
        assert_eq!(p.instruction_count, 80);
    }

    #[test]
    fn fixed_character_follows_displaced_mii_chain() {
        let mut team = straight_team(0);
        team.players[0] = Player::new(80, 2, 0);
        team.players[1] = Player::new(81, 0, 1);
        team.players[2] = Player::new(82, 1, 2);
        // Batting 3 -> C's 1 -> A's 2 -> B's 0.
        team.players[3] = Player::new(5, 3, 3);

        let slots = lineup_slots(&team).unwrap();
        assert_eq!(slots[0], SlotPlacement::Mii { slot: 1 });
        assert_eq!(slots[2], SlotPlacement::Mii { slot: 3 });
        assert_eq!(slots[3], SlotPlacement::Fixed { slot: 0 });
        assert_eq!(slots[4], SlotPlacement::Fixed { slot: 4 });
    }

    #[test]
    fn duplicate_batting_chain_is_rejected() {
        let mut team = straight_team(0);
        team.players[0] = Player::new(80, 1, 0);
        team.players[1].batting_order = 1;
        assert!(matches!(
            lineup_slots(&team),
            Err(PatchError::SlotChain { player: 2 })
        ));
    }

    #[test]
    fn rejects_short_team() {
        let mut away = straight_team(0);
        away.players.pop();
        assert!(matches!(
            compile(&away, &straight_team(0), &PatchTarget::MSS),
            Err(PatchError::WrongTeamSize { expected: 9, found: 8, .. })
        ));
    }

    #[test]
    fn apply_writes_hook_first_and_line_count_last() {
        let p = compile(&straight_team(0), &straight_team(1), &PatchTarget::MSS).unwrap();
        let mut mem = RecordingMemory::new();
        p.apply(&mut mem).unwrap();

        assert!(!mem.attached);
        assert_eq!(
            mem.writes.first(),
            Some(&MemoryWrite::Word {
                address: 0x8006_AED4,
                value: 0x4BF9_7324
            })
        );
        assert_eq!(
            mem.writes.last(),
            Some(&MemoryWrite::Word {
                address: 0x8000_21F4,
                value: 40
            })
        );
        assert_eq!(mem.word(0x8000_21F0), 0xC206_AED4);
        assert_eq!(mem.word(0x8000_21F4), 40);
    }
}
