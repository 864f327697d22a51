//! Binary instruction format shared by the bundle compiler and the runtime.
//!
//! A heap is a flat byte buffer holding one contiguous range per compiled
//! template. Every instruction is a single opcode byte followed by its
//! operands:
//!
//! - `u32` operands are little-endian,
//! - strings are a `u32` byte length followed by UTF-8 bytes,
//! - numbers are the little-endian bits of an `f64`.
//!
//! Block targets are relative to the start of the enclosing template, so a
//! compiled template can be placed anywhere in a heap. References to other
//! units are symbol-table indices, never heap offsets.

use std::sync::Arc;

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::SymbolKind;

/// Block operand meaning "no block".
pub const NO_BLOCK: u32 = u32::MAX;

/// Entry in an `Invoke` attribute list standing for the invoking
/// component's own forwarded attributes. It has no stack value.
pub const SPLAT_MARKER: &str = "...attributes";

/// Index into a symbol table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("#{_0}")]
pub struct SymbolIndex(pub u32);

impl SymbolIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Location of a compiled template inside a heap.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeapHandle {
    pub offset: u32,
    pub length: u32,
}

impl HeapHandle {
    pub fn new(offset: u32, length: u32) -> Self {
        Self { offset, length }
    }

    /// One past the last byte, computed without overflow.
    pub fn end(&self) -> u64 {
        self.offset as u64 + self.length as u64
    }

    pub fn overlaps(&self, other: &HeapHandle) -> bool {
        (self.offset as u64) < other.end() && (other.offset as u64) < self.end()
    }
}

/// Immutable, cheaply clonable bytecode buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Heap {
    bytes: Arc<[u8]>,
}

impl Heap {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes of one compiled unit, if the handle lies inside the heap.
    pub fn slice(&self, handle: HeapHandle) -> Option<&[u8]> {
        let start = handle.offset as usize;
        let end = usize::try_from(handle.end()).ok()?;
        self.bytes.get(start..end)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Text = 0x01,
    Comment = 0x02,
    OpenElement = 0x03,
    StaticAttr = 0x04,
    DynamicAttr = 0x05,
    Splattributes = 0x06,
    FlushElement = 0x07,
    CloseElement = 0x08,
    Append = 0x09,
    AppendTrusted = 0x0a,
    PushString = 0x10,
    PushNumber = 0x11,
    PushBool = 0x12,
    PushNull = 0x13,
    GetSelf = 0x14,
    GetArg = 0x15,
    GetLocal = 0x16,
    Concat = 0x17,
    CallHelper = 0x18,
    If = 0x20,
    Each = 0x21,
    Let = 0x22,
    Invoke = 0x23,
    Yield = 0x24,
    Return = 0x30,
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        Ok(match byte {
            0x01 => Opcode::Text,
            0x02 => Opcode::Comment,
            0x03 => Opcode::OpenElement,
            0x04 => Opcode::StaticAttr,
            0x05 => Opcode::DynamicAttr,
            0x06 => Opcode::Splattributes,
            0x07 => Opcode::FlushElement,
            0x08 => Opcode::CloseElement,
            0x09 => Opcode::Append,
            0x0a => Opcode::AppendTrusted,
            0x10 => Opcode::PushString,
            0x11 => Opcode::PushNumber,
            0x12 => Opcode::PushBool,
            0x13 => Opcode::PushNull,
            0x14 => Opcode::GetSelf,
            0x15 => Opcode::GetArg,
            0x16 => Opcode::GetLocal,
            0x17 => Opcode::Concat,
            0x18 => Opcode::CallHelper,
            0x20 => Opcode::If,
            0x21 => Opcode::Each,
            0x22 => Opcode::Let,
            0x23 => Opcode::Invoke,
            0x24 => Opcode::Yield,
            0x30 => Opcode::Return,
            other => return Err(other),
        })
    }
}

/// A decoded instruction.
///
/// Stack effects are noted per variant; the evaluation stack holds values.
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    Text(String),
    Comment(String),
    OpenElement(String),
    StaticAttr {
        name: String,
        value: String,
    },
    /// Pops the attribute value.
    DynamicAttr(String),
    /// Applies the attributes forwarded to the current component.
    Splattributes,
    FlushElement,
    CloseElement,
    /// Pops a value and appends it as escaped text.
    Append,
    /// Pops a value and appends it as raw HTML.
    AppendTrusted,
    PushString(String),
    PushNumber(f64),
    PushBool(bool),
    PushNull,
    GetSelf {
        path: Vec<String>,
    },
    GetArg {
        name: String,
        path: Vec<String>,
    },
    GetLocal {
        slot: u32,
        path: Vec<String>,
    },
    /// Pops `n` values and pushes their concatenation.
    Concat(u32),
    /// Pops `positional + named.len()` values, pushes the helper result.
    CallHelper {
        helper: SymbolIndex,
        positional: u32,
        named: Vec<String>,
    },
    /// Pops the condition.
    If {
        then: u32,
        otherwise: u32,
        end: u32,
    },
    /// Pops the list.
    Each {
        body: u32,
        otherwise: u32,
        end: u32,
        params: u32,
    },
    /// Pops `values` values and binds them as `params` block locals.
    Let {
        values: u32,
        body: u32,
        end: u32,
        params: u32,
    },
    /// Pops the named argument values, then the forwarded attribute values.
    /// `block` is the caller's block, rendered by `Yield`.
    Invoke {
        template: SymbolIndex,
        component: SymbolIndex,
        manager: SymbolIndex,
        args: Vec<String>,
        attrs: Vec<String>,
        block: u32,
        block_params: u32,
        end: u32,
    },
    /// Pops `n` block arguments and renders the caller's block.
    Yield(u32),
    Return,
}

#[derive(Clone, Debug, PartialEq, Eq, Display)]
pub enum DecodeErrorKind {
    #[display("unexpected end of bytecode")]
    UnexpectedEnd,
    #[display("unknown opcode 0x{_0:02x}")]
    UnknownOpcode(u8),
    #[display("string operand is not valid UTF-8")]
    InvalidUtf8,
}

#[derive(Clone, Debug, PartialEq, Eq, Display)]
#[display("bytecode error at offset {offset}: {kind}")]
pub struct DecodeError {
    pub offset: usize,
    pub kind: DecodeErrorKind,
}

impl std::error::Error for DecodeError {}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    start: usize,
}

impl<'a> Reader<'a> {
    fn error(&self, kind: DecodeErrorKind) -> DecodeError {
        DecodeError {
            offset: self.start,
            kind,
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| self.error(DecodeErrorKind::UnexpectedEnd))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn f64(&mut self) -> Result<f64, DecodeError> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(f64::from_bits(u64::from_le_bytes(buf)))
    }

    fn string(&mut self) -> Result<String, DecodeError> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| self.error(DecodeErrorKind::InvalidUtf8))
    }

    fn strings(&mut self) -> Result<Vec<String>, DecodeError> {
        let count = self.u32()?;
        (0..count).map(|_| self.string()).collect()
    }

    fn symbol(&mut self) -> Result<SymbolIndex, DecodeError> {
        self.u32().map(SymbolIndex)
    }
}

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    put_u32(buf, s.len() as u32);
    buf.extend_from_slice(s.as_bytes());
}

fn put_strs(buf: &mut Vec<u8>, strs: &[String]) {
    put_u32(buf, strs.len() as u32);
    for s in strs {
        put_str(buf, s);
    }
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Text(_) => Opcode::Text,
            Instruction::Comment(_) => Opcode::Comment,
            Instruction::OpenElement(_) => Opcode::OpenElement,
            Instruction::StaticAttr { .. } => Opcode::StaticAttr,
            Instruction::DynamicAttr(_) => Opcode::DynamicAttr,
            Instruction::Splattributes => Opcode::Splattributes,
            Instruction::FlushElement => Opcode::FlushElement,
            Instruction::CloseElement => Opcode::CloseElement,
            Instruction::Append => Opcode::Append,
            Instruction::AppendTrusted => Opcode::AppendTrusted,
            Instruction::PushString(_) => Opcode::PushString,
            Instruction::PushNumber(_) => Opcode::PushNumber,
            Instruction::PushBool(_) => Opcode::PushBool,
            Instruction::PushNull => Opcode::PushNull,
            Instruction::GetSelf { .. } => Opcode::GetSelf,
            Instruction::GetArg { .. } => Opcode::GetArg,
            Instruction::GetLocal { .. } => Opcode::GetLocal,
            Instruction::Concat(_) => Opcode::Concat,
            Instruction::CallHelper { .. } => Opcode::CallHelper,
            Instruction::If { .. } => Opcode::If,
            Instruction::Each { .. } => Opcode::Each,
            Instruction::Let { .. } => Opcode::Let,
            Instruction::Invoke { .. } => Opcode::Invoke,
            Instruction::Yield(_) => Opcode::Yield,
            Instruction::Return => Opcode::Return,
        }
    }

    /// Appends the encoded instruction to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.opcode() as u8);
        match self {
            Instruction::Text(s)
            | Instruction::Comment(s)
            | Instruction::OpenElement(s)
            | Instruction::DynamicAttr(s)
            | Instruction::PushString(s) => put_str(buf, s),
            Instruction::StaticAttr { name, value } => {
                put_str(buf, name);
                put_str(buf, value);
            }
            Instruction::Splattributes
            | Instruction::FlushElement
            | Instruction::CloseElement
            | Instruction::Append
            | Instruction::AppendTrusted
            | Instruction::PushNull
            | Instruction::Return => {}
            Instruction::PushNumber(n) => buf.extend_from_slice(&n.to_bits().to_le_bytes()),
            Instruction::PushBool(b) => buf.push(u8::from(*b)),
            Instruction::GetSelf { path } => put_strs(buf, path),
            Instruction::GetArg { name, path } => {
                put_str(buf, name);
                put_strs(buf, path);
            }
            Instruction::GetLocal { slot, path } => {
                put_u32(buf, *slot);
                put_strs(buf, path);
            }
            Instruction::Concat(n) | Instruction::Yield(n) => put_u32(buf, *n),
            Instruction::CallHelper {
                helper,
                positional,
                named,
            } => {
                put_u32(buf, helper.0);
                put_u32(buf, *positional);
                put_strs(buf, named);
            }
            Instruction::If {
                then,
                otherwise,
                end,
            } => {
                put_u32(buf, *then);
                put_u32(buf, *otherwise);
                put_u32(buf, *end);
            }
            Instruction::Each {
                body,
                otherwise,
                end,
                params,
            } => {
                put_u32(buf, *body);
                put_u32(buf, *otherwise);
                put_u32(buf, *end);
                put_u32(buf, *params);
            }
            Instruction::Let {
                values,
                body,
                end,
                params,
            } => {
                put_u32(buf, *values);
                put_u32(buf, *body);
                put_u32(buf, *end);
                put_u32(buf, *params);
            }
            Instruction::Invoke {
                template,
                component,
                manager,
                args,
                attrs,
                block,
                block_params,
                end,
            } => {
                put_u32(buf, template.0);
                put_u32(buf, component.0);
                put_u32(buf, manager.0);
                put_strs(buf, args);
                put_strs(buf, attrs);
                put_u32(buf, *block);
                put_u32(buf, *block_params);
                put_u32(buf, *end);
            }
        }
    }

    /// Decodes the instruction at `offset`, returning it with the offset of
    /// the next instruction.
    pub fn decode(bytes: &[u8], offset: usize) -> Result<(Instruction, usize), DecodeError> {
        let mut r = Reader {
            bytes,
            pos: offset,
            start: offset,
        };
        let byte = r.u8()?;
        let opcode =
            Opcode::try_from(byte).map_err(|b| r.error(DecodeErrorKind::UnknownOpcode(b)))?;
        let instruction = match opcode {
            Opcode::Text => Instruction::Text(r.string()?),
            Opcode::Comment => Instruction::Comment(r.string()?),
            Opcode::OpenElement => Instruction::OpenElement(r.string()?),
            Opcode::StaticAttr => Instruction::StaticAttr {
                name: r.string()?,
                value: r.string()?,
            },
            Opcode::DynamicAttr => Instruction::DynamicAttr(r.string()?),
            Opcode::Splattributes => Instruction::Splattributes,
            Opcode::FlushElement => Instruction::FlushElement,
            Opcode::CloseElement => Instruction::CloseElement,
            Opcode::Append => Instruction::Append,
            Opcode::AppendTrusted => Instruction::AppendTrusted,
            Opcode::PushString => Instruction::PushString(r.string()?),
            Opcode::PushNumber => Instruction::PushNumber(r.f64()?),
            Opcode::PushBool => Instruction::PushBool(r.u8()? != 0),
            Opcode::PushNull => Instruction::PushNull,
            Opcode::GetSelf => Instruction::GetSelf { path: r.strings()? },
            Opcode::GetArg => Instruction::GetArg {
                name: r.string()?,
                path: r.strings()?,
            },
            Opcode::GetLocal => Instruction::GetLocal {
                slot: r.u32()?,
                path: r.strings()?,
            },
            Opcode::Concat => Instruction::Concat(r.u32()?),
            Opcode::CallHelper => Instruction::CallHelper {
                helper: r.symbol()?,
                positional: r.u32()?,
                named: r.strings()?,
            },
            Opcode::If => Instruction::If {
                then: r.u32()?,
                otherwise: r.u32()?,
                end: r.u32()?,
            },
            Opcode::Each => Instruction::Each {
                body: r.u32()?,
                otherwise: r.u32()?,
                end: r.u32()?,
                params: r.u32()?,
            },
            Opcode::Let => Instruction::Let {
                values: r.u32()?,
                body: r.u32()?,
                end: r.u32()?,
                params: r.u32()?,
            },
            Opcode::Invoke => Instruction::Invoke {
                template: r.symbol()?,
                component: r.symbol()?,
                manager: r.symbol()?,
                args: r.strings()?,
                attrs: r.strings()?,
                block: r.u32()?,
                block_params: r.u32()?,
                end: r.u32()?,
            },
            Opcode::Yield => Instruction::Yield(r.u32()?),
            Opcode::Return => Instruction::Return,
        };
        Ok((instruction, r.pos))
    }

    /// Symbol operands together with the kind each must refer to.
    pub fn symbol_operands(&self) -> Vec<(SymbolIndex, SymbolKind)> {
        match self {
            Instruction::CallHelper { helper, .. } => vec![(*helper, SymbolKind::Helper)],
            Instruction::Invoke {
                template,
                component,
                manager,
                ..
            } => vec![
                (*template, SymbolKind::Template),
                (*component, SymbolKind::Component),
                (*manager, SymbolKind::ComponentManager),
            ],
            _ => Vec::new(),
        }
    }

    /// Template-relative block targets, excluding [`NO_BLOCK`].
    pub fn block_targets(&self) -> Vec<u32> {
        let targets = match self {
            Instruction::If {
                then,
                otherwise,
                end,
            } => vec![*then, *otherwise, *end],
            Instruction::Each {
                body,
                otherwise,
                end,
                ..
            } => vec![*body, *otherwise, *end],
            Instruction::Let { body, end, .. } => vec![*body, *end],
            Instruction::Invoke { block, end, .. } => vec![*block, *end],
            _ => Vec::new(),
        };
        targets.into_iter().filter(|t| *t != NO_BLOCK).collect()
    }
}

fn block(target: u32) -> String {
    if target == NO_BLOCK {
        "-".to_owned()
    } else {
        target.to_string()
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instruction::Text(s) => write!(f, "Text {:?}", s),
            Instruction::Comment(s) => write!(f, "Comment {:?}", s),
            Instruction::OpenElement(tag) => write!(f, "OpenElement {}", tag),
            Instruction::StaticAttr { name, value } => {
                write!(f, "StaticAttr {}={:?}", name, value)
            }
            Instruction::DynamicAttr(name) => write!(f, "DynamicAttr {}", name),
            Instruction::Splattributes => f.write_str("Splattributes"),
            Instruction::FlushElement => f.write_str("FlushElement"),
            Instruction::CloseElement => f.write_str("CloseElement"),
            Instruction::Append => f.write_str("Append"),
            Instruction::AppendTrusted => f.write_str("AppendTrusted"),
            Instruction::PushString(s) => write!(f, "PushString {:?}", s),
            Instruction::PushNumber(n) => write!(f, "PushNumber {}", n),
            Instruction::PushBool(b) => write!(f, "PushBool {}", b),
            Instruction::PushNull => f.write_str("PushNull"),
            Instruction::GetSelf { path } => write!(f, "GetSelf [{}]", path.join(".")),
            Instruction::GetArg { name, path } => {
                write!(f, "GetArg @{} [{}]", name, path.join("."))
            }
            Instruction::GetLocal { slot, path } => {
                write!(f, "GetLocal {} [{}]", slot, path.join("."))
            }
            Instruction::Concat(n) => write!(f, "Concat {}", n),
            Instruction::CallHelper {
                helper,
                positional,
                named,
            } => write!(
                f,
                "CallHelper {} positional={} named=[{}]",
                helper,
                positional,
                named.join(",")
            ),
            Instruction::If {
                then,
                otherwise,
                end,
            } => write!(
                f,
                "If then={} else={} end={}",
                block(*then),
                block(*otherwise),
                end
            ),
            Instruction::Each {
                body,
                otherwise,
                end,
                params,
            } => write!(
                f,
                "Each body={} else={} end={} params={}",
                body,
                block(*otherwise),
                end,
                params
            ),
            Instruction::Let {
                values,
                body,
                end,
                params,
            } => write!(
                f,
                "Let values={} body={} end={} params={}",
                values, body, end, params
            ),
            Instruction::Invoke {
                template,
                component,
                manager,
                args,
                attrs,
                block: body,
                block_params,
                end,
            } => write!(
                f,
                "Invoke {} component={} manager={} args=[{}] attrs=[{}] block={} params={} end={}",
                template,
                component,
                manager,
                args.join(","),
                attrs.join(","),
                block(*body),
                block_params,
                end
            ),
            Instruction::Yield(n) => write!(f, "Yield {}", n),
            Instruction::Return => f.write_str("Return"),
        }
    }
}

/// Appends instructions to a unit-local buffer and patches block operands.
#[derive(Debug, Default)]
pub struct BytecodeWriter {
    buf: Vec<u8>,
}

impl BytecodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current offset relative to the start of the unit.
    pub fn position(&self) -> u32 {
        self.buf.len() as u32
    }

    /// Emits `instruction` and returns its offset.
    pub fn emit(&mut self, instruction: &Instruction) -> u32 {
        let at = self.position();
        instruction.encode(&mut self.buf);
        at
    }

    /// Re-encodes the instruction at `at`. Only fixed-width operands may
    /// change, so the encoded length must stay the same.
    pub fn patch(&mut self, at: u32, instruction: &Instruction) {
        let mut encoded = Vec::new();
        instruction.encode(&mut encoded);
        let start = at as usize;
        let end = start + encoded.len();
        debug_assert!(
            end <= self.buf.len(),
            "patched instruction overruns the buffer"
        );
        self.buf[start..end].copy_from_slice(&encoded);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Decodes every instruction in `code`, pairing each with its offset.
pub fn decode_all(code: &[u8]) -> Result<Vec<(usize, Instruction)>, DecodeError> {
    let mut pos = 0;
    let mut out = Vec::new();
    while pos < code.len() {
        let (instruction, next) = Instruction::decode(code, pos)?;
        out.push((pos, instruction));
        pos = next;
    }
    Ok(out)
}

/// Human-readable listing of one compiled unit.
pub fn disassemble(code: &[u8]) -> Result<String, DecodeError> {
    let mut out = String::new();
    for (offset, instruction) in decode_all(code)? {
        out.push_str(&format!("{:04} {}\n", offset, instruction));
    }
    Ok(out)
}
