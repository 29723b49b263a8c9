//! Machine-code builder (component R): assembles basic-block byte
//! sequences into one function body, applies deferred literal/offset
//! patches, and installs the result into the code pool

use super::vmem::{Pool, PoolPtr};
use derivative::Derivative;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Emitting,
    Patching,
    Finished,
}

#[derive(Clone, Debug)]
pub enum AnnotationKind {
    CallSite(String),
    SourceCodeLocation(String),
}

#[derive(Clone, Debug)]
pub struct Annotation {
    pub kind: AnnotationKind,
    pub offset: u32,
}

#[derive(Debug)]
pub struct MachineCodeFunction {
    pub code_ptr: PoolPtr,
    pub code_size: u32,
    pub block_offsets: Vec<u32>,
    pub annotations: Vec<Annotation>,
}

/// Invoked `PrepareCode` → any number of `EmitCode` → any mix of `Set*` →
/// exactly one `FinishCode`. Violating that order is a programmer error:
/// emit-after-patch panics, and `finish_code` consumes the builder so a
/// second call cannot compile.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct MachineCodeBuilder {
    phase: Phase,
    #[derivative(Debug = "ignore")]
    buffer: Vec<u8>,
    block_offsets: Vec<u32>,
    annotations: Vec<Annotation>,
}

impl MachineCodeBuilder {
    pub fn prepare_code(total: usize) -> Self {
        MachineCodeBuilder {
            phase: Phase::Emitting,
            buffer: Vec::with_capacity(total),
            block_offsets: Vec::new(),
            annotations: Vec::new(),
        }
    }

    pub fn emit_code(&mut self, bytes: &[u8]) {
        assert_eq!(self.phase, Phase::Emitting, "EmitCode called after patching began");
        self.block_offsets.push(self.buffer.len() as u32);
        self.buffer.extend_from_slice(bytes);
    }

    fn enter_patching(&mut self) {
        assert_ne!(self.phase, Phase::Finished, "builder already finished");
        self.phase = Phase::Patching;
    }

    /// Patches a 32-bit relative displacement at `from` so the instruction
    /// jumps to `to`, relative to the end of the 4-byte displacement field
    /// (RIP-of-next-instruction).
    pub fn set_code_offset(&mut self, from: usize, to: usize) {
        self.enter_patching();
        let rel = to as i64 - (from as i64 + 4);
        let rel = i32::try_from(rel).expect("branch target out of 32-bit relative range");
        self.buffer[from..from + 4].copy_from_slice(&rel.to_le_bytes());
    }

    pub fn set_int32(&mut self, offset: usize, value: i32) {
        self.enter_patching();
        self.buffer[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn set_int64(&mut self, offset: usize, value: i64) {
        self.enter_patching();
        self.buffer[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    }

    pub fn set_float32(&mut self, offset: usize, value: f32) {
        self.enter_patching();
        self.buffer[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn set_float64(&mut self, offset: usize, value: f64) {
        self.enter_patching();
        self.buffer[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    }

    /// Allocates `s`'s UTF-16 payload in the data pool and patches the
    /// 8-byte pointer slot at `offset` with a stand-in handle (this core
    /// has no real process address space to embed).
    pub fn set_string(&mut self, offset: usize, data_pool: &mut Pool, s: &str) {
        self.enter_patching();
        let units: Vec<u8> = s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        let ptr = data_pool.allocate(units.len());
        data_pool.write(ptr, &units);
        self.buffer[offset..offset + 8].copy_from_slice(&ptr.as_handle().to_le_bytes());
    }

    pub fn set_call_site(&mut self, offset: usize, name: impl Into<String>) {
        self.enter_patching();
        self.annotations.push(Annotation { kind: AnnotationKind::CallSite(name.into()), offset: offset as u32 });
    }

    pub fn set_source_code_location(&mut self, offset: usize, loc: impl Into<String>) {
        self.enter_patching();
        self.annotations
            .push(Annotation { kind: AnnotationKind::SourceCodeLocation(loc.into()), offset: offset as u32 });
    }

    pub fn finish_code(mut self, code_pool: &mut Pool) -> MachineCodeFunction {
        assert_ne!(self.phase, Phase::Finished, "builder already finished");
        self.phase = Phase::Finished;
        let ptr = code_pool.allocate(self.buffer.len());
        code_pool.write(ptr, &self.buffer);
        MachineCodeFunction {
            code_ptr: ptr,
            code_size: self.buffer.len() as u32,
            block_offsets: self.block_offsets,
            annotations: self.annotations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::vmem::Protection;

    #[test]
    fn assembles_blocks_and_patches_a_branch() {
        let mut code = Pool::new(Protection::ReadWriteExecute);
        let mut b = MachineCodeBuilder::prepare_code(16);
        b.emit_code(&[0x90]); // block 0: NOP
        let (jcc, disp_off) = crate::codegen::encoder::encode_jcc_rel32(
            crate::codegen::encoder::Condition::Below,
            0,
        );
        let branch_offset = 1;
        b.emit_code(&jcc);
        b.emit_code(&[0xC3]); // block 2: RET, the branch target
        b.set_code_offset(branch_offset + disp_off, 3);
        let func = b.finish_code(&mut code);

        assert_eq!(func.block_offsets, vec![0, 1, 7]);
        assert_eq!(func.code_size, 8);
        let bytes = code.read(func.code_ptr, func.code_size as usize);
        assert_eq!(bytes[branch_offset + disp_off..branch_offset + disp_off + 4], (-4i32).to_le_bytes());
    }

    #[test]
    #[should_panic]
    fn emit_after_patch_is_a_programmer_error() {
        let mut b = MachineCodeBuilder::prepare_code(4);
        b.emit_code(&[0x90]);
        b.set_int32(0, 1);
        b.emit_code(&[0x90]);
    }

    #[test]
    fn string_literal_round_trips_through_data_pool() {
        let mut code = Pool::new(Protection::ReadWriteExecute);
        let mut data = Pool::new(Protection::ReadWrite);
        let mut b = MachineCodeBuilder::prepare_code(8);
        b.emit_code(&[0u8; 8]);
        b.set_string(0, &mut data, "hi");
        let func = b.finish_code(&mut code);
        assert_eq!(func.code_size, 8);
    }
}
