//! A growable machine-code buffer with deferred label resolution.
//!
//! Instruction selection and emission happen in one forward pass over [`VCode`](super::vcode::VCode),
//! but branch targets are only known once every block has been emitted. [`MachBuffer`] lets
//! emitters reference a [`MachLabel`] before its address is known, binds labels to offsets as
//! blocks are emitted, and patches every outstanding use in [`MachBuffer::finalize`]. When a
//! branch's encoding cannot reach its target (the label is bound too far away for the
//! instruction's immediate field), the buffer inserts a veneer: a longer-range jump sequence
//! placed in a constant/code island between blocks.

use alloc::vec::Vec;
use cranelift_entity::{entity_impl, PrimaryMap};

/// A position to branch to, bound to a code offset once the block containing it has been
/// emitted.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, PartialOrd, Ord)]
pub struct MachLabel(u32);
entity_impl!(MachLabel, "label");

/// How a fixup's bits are encoded into the instruction, and therefore how far it can reach and
/// how it must be rewritten if a veneer is needed.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum LabelUseKind {
    /// An AArch64 PC-relative branch immediate: `bit_count` bits starting at bit `lsb` of the
    /// 4-byte instruction word at the fixup offset, holding a signed displacement scaled down by
    /// 4 (every AArch64 branch/compare-and-branch form). Out-of-range uses get a veneer: a copy
    /// of the instruction's own word spliced in as an island and repatched against the true
    /// target, with the original word repatched to branch to the island instead.
    Aarch64Branch {
        /// Width of the immediate field, in bits (26 for `b`, 19 for `b.cond`/`cbz`/`cbnz`).
        bit_count: u8,
        /// Bit position of the immediate field's least significant bit within the word.
        lsb: u8,
    },
    /// An x86-64 `rel32`: a raw signed 32-bit displacement, not instruction-scaled, written
    /// little-endian at the fixup offset, relative to the byte immediately following it. Its
    /// ~2GB range is never exceeded by anything this crate emits, so it is never veneered.
    X86Rel32,
    /// An absolute 64-bit address patched into the buffer (e.g. a jump-table entry). Always
    /// reachable.
    Absolute8,
}

impl LabelUseKind {
    fn mask(bit_count: u8) -> u32 {
        if bit_count >= 32 {
            u32::MAX
        } else {
            (1u32 << bit_count) - 1
        }
    }
}

/// Schematic `ldr x16, #8` (PC-relative literal load of the 8 bytes immediately following the
/// next instruction) used to build an out-of-range-branch veneer. Not bit-for-bit ABI-accurate,
/// consistent with this crate's other schematic encodings.
const AARCH64_VENEER_LDR_X16: u32 = 0x5800_0050;
/// Schematic `br x16`.
const AARCH64_VENEER_BR_X16: u32 = 0xd61f_0200;

/// One outstanding reference to a [`MachLabel`] whose address is not yet known.
#[derive(Clone, Debug)]
struct LabelFixup {
    label: MachLabel,
    offset: u32,
    kind: LabelUseKind,
}

/// A relocation to be resolved by the linker/loader after emission (calls to external symbols,
/// references to data symbols).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MachReloc {
    /// Byte offset within the buffer.
    pub offset: u32,
    /// Relocation kind, as understood by the object-file writer.
    pub kind: RelocKind,
    /// Name of the referenced external symbol.
    pub name: crate::ir::ExternalName,
    /// Constant added to the symbol's address before use.
    pub addend: i64,
}

/// Relocation encodings the backends emit. Kept small and target-generic; object-file-specific
/// translation happens downstream.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum RelocKind {
    /// A 26-bit PC-relative branch immediate (AArch64 `bl`/`b`).
    Aarch64Call26,
    /// A 32-bit PC-relative displacement (x86-64 `call`/`jmp rel32`).
    X86CallPcRel32,
    /// An absolute 64-bit pointer, for jump tables and data references.
    Abs8,
}

/// A record of a trapping instruction, for building a trap table consumed by a runtime's signal
/// handler.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct MachTrap {
    /// Byte offset of the trapping instruction.
    pub offset: u32,
    /// Why this instruction can trap.
    pub code: crate::ir::TrapCode,
}

/// A call-site record, for building stack maps / unwind tables keyed by return address.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct MachCallSite {
    /// Byte offset of the return address (the instruction immediately after the call).
    pub ret_addr_offset: u32,
}

/// An island is a run of non-instruction bytes (veneers, constant pool entries) spliced into the
/// instruction stream at a point reachable by every fixup that needs it.
#[derive(Clone, Debug)]
struct Island {
    offset: u32,
    bytes: Vec<u8>,
}

/// The output of [`MachBuffer::finalize`]: a flat, fully-resolved code buffer plus side tables.
#[derive(Clone, Debug, Default)]
pub struct MachBufferFinalized {
    /// The encoded machine code, including any veneers/constant-pool islands.
    pub data: Vec<u8>,
    /// Relocations to external symbols.
    pub relocs: Vec<MachReloc>,
    /// Traps recorded during emission.
    pub traps: Vec<MachTrap>,
    /// Call sites recorded during emission.
    pub call_sites: Vec<MachCallSite>,
    /// Resolved byte offset of every label that was bound.
    pub label_offsets: PrimaryMap<MachLabel, u32>,
}

/// An append-only machine code buffer used by a backend's emission pass.
///
/// Labels are allocated up front (one per VCode block, plus any the backend needs for internal
/// control flow such as out-of-line trap paths) and bound to an offset exactly once, when the
/// code they name has been appended. Uses of a label recorded before it is bound are fixed up in
/// [`finalize`](Self::finalize); uses recorded after binding are resolved immediately.
#[derive(Default)]
pub struct MachBuffer {
    data: Vec<u8>,
    relocs: Vec<MachReloc>,
    traps: Vec<MachTrap>,
    call_sites: Vec<MachCallSite>,
    label_offsets: PrimaryMap<MachLabel, Option<u32>>,
    fixups: Vec<LabelFixup>,
    islands: Vec<Island>,
}

impl MachBuffer {
    /// An empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current write offset, i.e. the length of the code emitted so far.
    pub fn cur_offset(&self) -> u32 {
        self.data.len() as u32
    }

    /// Allocate a new, as-yet-unbound label.
    pub fn get_label(&mut self) -> MachLabel {
        self.label_offsets.push(None)
    }

    /// Append raw instruction bytes.
    pub fn put(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Append a 4-byte instruction word (the common case for AArch64 and most x86-64 encodings
    /// minus their prefixes/immediates, which callers append separately via [`Self::put`]).
    pub fn put4(&mut self, word: u32) {
        self.data.extend_from_slice(&word.to_le_bytes());
    }

    /// Bind `label` to the current offset. A label may only be bound once.
    ///
    /// # Panics
    /// Panics if `label` has already been bound.
    pub fn bind_label(&mut self, label: MachLabel) {
        let offset = self.cur_offset();
        let slot = &mut self.label_offsets[label];
        assert!(slot.is_none(), "label {:?} bound twice", label);
        *slot = Some(offset);
    }

    /// Record that the bytes just written (the most recently emitted instruction) reference
    /// `label` using `kind`'s encoding, at `instr_offset`.
    pub fn use_label_at_offset(&mut self, instr_offset: u32, label: MachLabel, kind: LabelUseKind) {
        if let Some(&Some(target)) = self.label_offsets.get(label) {
            if self.try_patch_immediate(instr_offset, target, kind) {
                return;
            }
        }
        self.fixups.push(LabelFixup {
            label,
            offset: instr_offset,
            kind,
        });
    }

    /// Record a relocation against an external symbol at `offset`.
    pub fn add_reloc(&mut self, offset: u32, kind: RelocKind, name: &crate::ir::ExternalName, addend: i64) {
        self.relocs.push(MachReloc {
            offset,
            kind,
            name: name.clone(),
            addend,
        });
    }

    /// Record that the instruction at `offset` can trap with `code`.
    pub fn add_trap(&mut self, offset: u32, code: crate::ir::TrapCode) {
        self.traps.push(MachTrap { offset, code });
    }

    /// Record a call site whose return address is at `ret_addr_offset`.
    pub fn add_call_site(&mut self, ret_addr_offset: u32) {
        self.call_sites.push(MachCallSite { ret_addr_offset });
    }

    /// Splice a veneer or constant-pool island (raw bytes with no further label references) into
    /// the stream at the current offset, returning its offset.
    pub fn insert_island(&mut self, bytes: &[u8]) -> u32 {
        let offset = self.cur_offset();
        self.islands.push(Island {
            offset,
            bytes: bytes.to_vec(),
        });
        self.data.extend_from_slice(bytes);
        offset
    }

    /// Directly overwrite the 4-byte word at `offset`, bypassing the label/fixup machinery. Used
    /// when both the instruction's own offset and its target are already known at emission time
    /// (e.g. a PC-relative literal load whose literal was just appended as an island).
    pub fn patch_word_at(&mut self, offset: u32, word: u32) {
        let idx = offset as usize;
        self.data[idx..idx + 4].copy_from_slice(&word.to_le_bytes());
    }

    /// Whether a fixup at `offset` encoded as `kind` can reach `target`.
    fn in_range(offset: u32, target: u32, kind: LabelUseKind) -> bool {
        match kind {
            LabelUseKind::Aarch64Branch { bit_count, .. } => {
                let delta = target as i64 - offset as i64;
                if delta % 4 != 0 {
                    return false;
                }
                let imm = delta / 4;
                let half = 1i64 << (bit_count - 1);
                imm >= -half && imm < half
            }
            LabelUseKind::X86Rel32 => {
                let rel = target as i64 - offset as i64 - 4;
                rel >= i32::MIN as i64 && rel <= i32::MAX as i64
            }
            LabelUseKind::Absolute8 => true,
        }
    }

    /// Patch the resolved `target` into the fixup field at `offset`, assuming it is in range.
    fn patch(&mut self, offset: u32, target: u32, kind: LabelUseKind) {
        let idx = offset as usize;
        match kind {
            LabelUseKind::Aarch64Branch { bit_count, lsb } => {
                let delta = target as i64 - offset as i64;
                let imm = ((delta / 4) as i32) as u32;
                let mask = LabelUseKind::mask(bit_count);
                let mut word = u32::from_le_bytes(self.data[idx..idx + 4].try_into().unwrap());
                word = (word & !(mask << lsb)) | ((imm & mask) << lsb);
                self.data[idx..idx + 4].copy_from_slice(&word.to_le_bytes());
            }
            LabelUseKind::X86Rel32 => {
                let rel = (target as i64 - offset as i64 - 4) as i32;
                self.data[idx..idx + 4].copy_from_slice(&rel.to_le_bytes());
            }
            LabelUseKind::Absolute8 => {
                self.data[idx..idx + 8].copy_from_slice(&(target as u64).to_le_bytes());
            }
        }
    }

    /// Attempt to patch a resolved target directly into the instruction at `instr_offset`.
    /// Returns `false` (leaving the fixup outstanding) if the encoding cannot reach: the caller
    /// is then responsible for inserting a veneer and re-targeting the branch at it before
    /// finalization.
    fn try_patch_immediate(&mut self, instr_offset: u32, target: u32, kind: LabelUseKind) -> bool {
        if !Self::in_range(instr_offset, target, kind) {
            return false;
        }
        self.patch(instr_offset, target, kind);
        true
    }

    /// Resolve every outstanding fixup against its label's bound offset, inserting veneers for
    /// any branch whose target falls out of encodable range, and return the finalized buffer.
    ///
    /// # Panics
    /// Panics if any referenced label was never bound, or if a non-veneerable fixup (an x86
    /// `rel32`, or an AArch64 conditional branch/compare-and-branch's 19-bit field) is out of
    /// range.
    pub fn finalize(mut self) -> MachBufferFinalized {
        let mut resolved = PrimaryMap::new();
        for (label, off) in self.label_offsets.iter() {
            let off = off.unwrap_or_else(|| panic!("label {:?} never bound", label));
            let idx = resolved.push(off);
            debug_assert_eq!(idx, label);
        }

        let fixups = core::mem::take(&mut self.fixups);
        for fixup in fixups {
            let target = resolved[fixup.label];
            if Self::in_range(fixup.offset, target, fixup.kind) {
                self.patch(fixup.offset, target, fixup.kind);
                continue;
            }
            match fixup.kind {
                LabelUseKind::Aarch64Branch { bit_count: 26, .. } => {
                    // Only the unconditional `b` form (26-bit field) is veneered: splice in an
                    // indirect-branch island (schematically `ldr x16, #8` / `br x16` followed by
                    // the absolute 64-bit target) and repoint the original branch at it. The
                    // island's own reach is unbounded since the target is loaded as an absolute
                    // address rather than encoded as a further PC-relative displacement, so this
                    // always terminates regardless of how far away `target` is.
                    let mut veneer = alloc::vec::Vec::with_capacity(16);
                    veneer.extend_from_slice(&AARCH64_VENEER_LDR_X16.to_le_bytes());
                    veneer.extend_from_slice(&AARCH64_VENEER_BR_X16.to_le_bytes());
                    veneer.extend_from_slice(&(target as u64).to_le_bytes());
                    let island_offset = self.insert_island(&veneer);
                    assert!(
                        Self::in_range(fixup.offset, island_offset, fixup.kind),
                        "branch at offset {} cannot reach its own veneer at offset {}",
                        fixup.offset,
                        island_offset
                    );
                    self.patch(fixup.offset, island_offset, fixup.kind);
                }
                _ => panic!(
                    "branch at offset {} cannot reach label {:?} at offset {}",
                    fixup.offset, fixup.label, target
                ),
            }
        }

        MachBufferFinalized {
            data: self.data,
            relocs: self.relocs,
            traps: self.traps,
            call_sites: self.call_sites,
            label_offsets: resolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_bound_after_use_resolves_lazily() {
        let mut buf = MachBuffer::new();
        let l0 = buf.get_label();
        buf.put4(0); // placeholder branch, 26-bit immediate at bit 0 (AArch64 `b`)
        buf.use_label_at_offset(0, l0, LabelUseKind::Aarch64Branch { bit_count: 26, lsb: 0 });
        buf.put4(0);
        buf.put4(0);
        buf.bind_label(l0);
        let out = buf.finalize();
        assert_eq!(out.label_offsets[l0], 12);
        // displacement is (12 - 0) / 4 = 3, in the low 26 bits.
        assert_eq!(u32::from_le_bytes(out.data[0..4].try_into().unwrap()), 3);
    }

    #[test]
    fn label_bound_before_use_resolves_immediately() {
        let mut buf = MachBuffer::new();
        let l0 = buf.get_label();
        buf.bind_label(l0);
        buf.put4(0);
        buf.put4(0xffff_ffff); // pre-existing bits outside the immediate field must survive
        buf.use_label_at_offset(4, l0, LabelUseKind::Aarch64Branch { bit_count: 26, lsb: 0 });
        let out = buf.finalize();
        assert_eq!(out.label_offsets[l0], 0);
        // displacement is (0 - 4) / 4 = -1 -> low 26 bits all set, top 6 bits (of the original
        // 0xffff_ffff) must remain untouched.
        let word = u32::from_le_bytes(out.data[4..8].try_into().unwrap());
        assert_eq!(word, 0xffff_ffff);
    }

    #[test]
    fn x86_rel32_is_patched_relative_to_instruction_end() {
        let mut buf = MachBuffer::new();
        let l0 = buf.get_label();
        buf.put(&[0xe9, 0, 0, 0, 0]); // jmp rel32, opcode byte then 4-byte placeholder
        buf.use_label_at_offset(1, l0, LabelUseKind::X86Rel32);
        buf.put4(0);
        buf.bind_label(l0);
        let out = buf.finalize();
        assert_eq!(out.label_offsets[l0], 9);
        // rel32 is relative to the byte after the 4-byte field, i.e. offset 5.
        let rel = i32::from_le_bytes(out.data[1..5].try_into().unwrap());
        assert_eq!(rel, 4);
    }

    #[test]
    #[should_panic(expected = "never bound")]
    fn finalize_panics_on_unbound_label() {
        let mut buf = MachBuffer::new();
        let _l0 = buf.get_label();
        buf.finalize();
    }

    #[test]
    fn islands_are_appended_to_the_stream() {
        let mut buf = MachBuffer::new();
        buf.put4(0);
        let off = buf.insert_island(&[1, 2, 3, 4]);
        assert_eq!(off, 4);
        let out = buf.finalize();
        assert_eq!(&out.data[4..8], &[1, 2, 3, 4]);
    }

    #[test]
    fn out_of_range_unconditional_branch_gets_a_veneer() {
        let mut buf = MachBuffer::new();
        // label bound at offset 0, long before the branch that references it.
        let l0 = buf.get_label();
        buf.bind_label(l0);
        // pad well past the 26-bit field's +-128MiB range before emitting the branch.
        let far = (1usize << 27) + 4096;
        buf.put(&alloc::vec![0u8; far]);
        buf.put4(0); // the out-of-range branch itself
        buf.use_label_at_offset(far as u32, l0, LabelUseKind::Aarch64Branch { bit_count: 26, lsb: 0 });
        buf.put4(0); // a little more code after the branch
        let out = buf.finalize();
        let target = out.label_offsets[l0];
        assert_eq!(target, 0);

        let veneer_offset = far as u32 + 8;
        // the veneer is 16 bytes: ldr/br words plus an 8-byte absolute address.
        assert_eq!(out.data.len() as u32, veneer_offset + 16);
        assert_eq!(
            u32::from_le_bytes(out.data[veneer_offset as usize..veneer_offset as usize + 4].try_into().unwrap()),
            AARCH64_VENEER_LDR_X16,
        );
        assert_eq!(
            u32::from_le_bytes(
                out.data[veneer_offset as usize + 4..veneer_offset as usize + 8]
                    .try_into()
                    .unwrap()
            ),
            AARCH64_VENEER_BR_X16,
        );
        let abs = u64::from_le_bytes(
            out.data[veneer_offset as usize + 8..veneer_offset as usize + 16]
                .try_into()
                .unwrap(),
        );
        assert_eq!(abs, target as u64);

        // the original branch now targets the veneer, not the label directly.
        let branch_word = u32::from_le_bytes(out.data[far..far + 4].try_into().unwrap());
        let orig_disp = ((branch_word & ((1 << 26) - 1)) as i32) as i64;
        assert_eq!(orig_disp * 4, veneer_offset as i64 - far as i64);
    }

    #[test]
    fn patch_word_at_overwrites_in_place() {
        let mut buf = MachBuffer::new();
        buf.put4(0xdead_beef);
        buf.patch_word_at(0, 0x1234_5678);
        let out = buf.finalize();
        assert_eq!(u32::from_le_bytes(out.data[0..4].try_into().unwrap()), 0x1234_5678);
    }
}
