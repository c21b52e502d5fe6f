//! Hooks for collaborators outside the video engine.
//!
//! Both follow the same bind-once pattern as the video hooks: a disassembly
//! override a driver may attach to a CPU device, and the per-game protection
//! key chip selected by key type. The algorithms behind them live with their
//! owners; this module only resolves and calls through.

use std::fmt;
use std::rc::Rc;

use crate::error::{VideoError, VideoResult};
use crate::hooks::{Hook, HookRegistry};

/// Disassembly override: `(out, pc, opcodes, params) -> bytes consumed`.
pub type DasmOverrideFn = dyn Fn(&mut dyn fmt::Write, u32, &[u8], &[u8]) -> u32;

/// A device's own disassembler.
pub trait Disassemble {
    fn disassemble(&self, out: &mut dyn fmt::Write, pc: u32, opcodes: &[u8], params: &[u8]) -> u32;
}

/// Wraps a device disassembler with an optional driver override. The
/// override may only be attached before [`start`](Self::start).
pub struct Disassembler<D> {
    device: D,
    dasm_override: Hook<DasmOverrideFn>,
    started: bool,
}

impl<D: Disassemble> Disassembler<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            dasm_override: Hook::unbound("disassembly override"),
            started: false,
        }
    }

    pub fn set_dasm_override(&mut self, callable: Rc<DasmOverrideFn>) -> VideoResult<()> {
        if self.started {
            return Err(VideoError::RegistrySealed {
                registry: "disassembly override",
            });
        }
        self.dasm_override = Hook::bound("disassembly override", callable);
        Ok(())
    }

    pub fn start(&mut self) {
        self.started = true;
        if self.dasm_override.is_bound() {
            log::debug!("disassembler: driver override active");
        }
    }

    pub fn has_override(&self) -> bool {
        self.dasm_override.is_bound()
    }

    pub fn disassemble(&self, out: &mut dyn fmt::Write, pc: u32, opcodes: &[u8], params: &[u8]) -> u32 {
        match self.dasm_override.get() {
            Some(dasm) => dasm(out, pc, opcodes, params),
            None => self.device.disassemble(out, pc, opcodes, params),
        }
    }
}

/// Protection key chip families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyType {
    None,
    Type1,
    Type2,
    Type3,
}

/// Register state shared by every key chip implementation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyState {
    pub key_id: u8,
    pub key: [u8; 8],
}

/// Read/write pair implementing one key chip family.
pub struct KeyHandler {
    pub read: Box<dyn Fn(&KeyState, u16) -> u8>,
    pub write: Box<dyn Fn(&mut KeyState, u16, u8)>,
}

pub type KeyRegistry = HookRegistry<KeyType, KeyHandler>;

/// A board's key chip, bound once to the handler for its family.
pub struct KeyChip {
    kind: KeyType,
    state: KeyState,
    handler: Hook<KeyHandler>,
}

impl KeyChip {
    pub fn resolve(registry: &KeyRegistry, kind: KeyType, key_id: u8) -> Self {
        let handler = match kind {
            KeyType::None => Hook::unbound("key chip"),
            _ => registry.capability(kind, "key chip"),
        };
        Self {
            kind,
            state: KeyState {
                key_id,
                ..KeyState::default()
            },
            handler,
        }
    }

    pub fn kind(&self) -> KeyType {
        self.kind
    }

    pub fn state(&self) -> &KeyState {
        &self.state
    }

    /// Without a handler the chip behaves as absent: reads float to 0.
    pub fn read(&self, offset: u16) -> u8 {
        match self.handler.get() {
            Some(handler) => (handler.read)(&self.state, offset),
            None => {
                log::debug!("key chip {:?}: unhandled read at {:#x}", self.kind, offset);
                0
            }
        }
    }

    pub fn write(&mut self, offset: u16, data: u8) {
        match self.handler.get() {
            Some(handler) => (handler.write)(&mut self.state, offset, data),
            None => log::debug!(
                "key chip {:?}: unhandled write {:#04x} at {:#x}",
                self.kind,
                data,
                offset
            ),
        }
    }
}
