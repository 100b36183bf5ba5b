//! Raw class-file parser.
//!
//! Reads the byte stream in strict JVMS §4 order and produces a
//! [`ParsedClass`]. The parser only guarantees that the bytes exist and
//! field widths are respected; every cross-reference and grammar rule is
//! deferred to the format checker. The one semantic side effect is string
//! interning: class names encountered while parsing are normalized and
//! inserted into the global string pool, and the returned record stores
//! the pool handles.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use super::class::{
    Attr, BootstrapMethod, BytecodeToSourceLine, CodeAttr, CodeException, Field, Method,
    MethodParameter, ParsedClass,
};
use super::constpool::{ConstantPool, CpEntry};
use super::defs::{attribute_names, MAGIC, MAX_SUPPORTED_MAJOR, MIN_SUPPORTED_MAJOR};
use crate::cfe;
use crate::common::diag::DiagSink;
use crate::common::error::Result;
use crate::runtime::string_pool;

/// Parse a class presented as a byte slice.
pub fn parse(raw: &[u8], sink: &DiagSink) -> Result<ParsedClass> {
    let mut rdr = ClassReader::new(raw, sink);
    let mut klass = ParsedClass::new();

    parse_header(&mut rdr, &mut klass)?;
    parse_constant_pool(&mut rdr, &mut klass)?;

    klass.access_flags = rdr.read_u16()?;

    parse_this_and_super(&mut rdr, &mut klass)?;
    parse_interfaces(&mut rdr, &mut klass)?;
    parse_fields(&mut rdr, &mut klass)?;
    parse_methods(&mut rdr, &mut klass)?;
    parse_class_attributes(&mut rdr, &mut klass)?;

    if !rdr.at_end() {
        return Err(cfe!(
            rdr.sink,
            "extra bytes after end of class structure at offset {}",
            rdr.offset()
        ));
    }
    Ok(klass)
}

/// Normalize a class reference from the constant pool into plain
/// `pkg/Class` form: `[Lpkg/Class;` loses its array wrapping, primitive
/// array references resolve to the empty string.
pub fn normalize_class_reference(reference: &str) -> &str {
    if let Some(stripped) = reference.strip_prefix("[L") {
        stripped.strip_suffix(';').unwrap_or(stripped)
    } else if reference.starts_with('[') {
        ""
    } else {
        reference
    }
}

struct ClassReader<'a> {
    cur: Cursor<&'a [u8]>,
    len: usize,
    sink: &'a DiagSink,
}

impl<'a> ClassReader<'a> {
    fn new(raw: &'a [u8], sink: &'a DiagSink) -> Self {
        ClassReader {
            cur: Cursor::new(raw),
            len: raw.len(),
            sink,
        }
    }

    fn offset(&self) -> u64 {
        self.cur.position()
    }

    fn at_end(&self) -> bool {
        self.cur.position() as usize >= self.len
    }

    fn truncated(&self) -> crate::common::error::JvmError {
        cfe!(
            self.sink,
            "class file truncated at offset {} of {}",
            self.offset(),
            self.len
        )
    }

    fn read_u8(&mut self) -> Result<u8> {
        self.cur.read_u8().map_err(|_| self.truncated())
    }

    fn read_u16(&mut self) -> Result<u16> {
        self.cur.read_u16::<BigEndian>().map_err(|_| self.truncated())
    }

    fn read_u32(&mut self) -> Result<u32> {
        self.cur.read_u32::<BigEndian>().map_err(|_| self.truncated())
    }

    fn read_i32(&mut self) -> Result<i32> {
        self.cur.read_i32::<BigEndian>().map_err(|_| self.truncated())
    }

    fn read_i64(&mut self) -> Result<i64> {
        self.cur.read_i64::<BigEndian>().map_err(|_| self.truncated())
    }

    fn read_u64(&mut self) -> Result<u64> {
        self.cur.read_u64::<BigEndian>().map_err(|_| self.truncated())
    }

    fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let remaining = self.len - self.cur.position() as usize;
        if n > remaining {
            return Err(cfe!(
                self.sink,
                "declared length {} exceeds the {} bytes remaining at offset {}",
                n,
                remaining,
                self.offset()
            ));
        }
        let mut buf = vec![0u8; n];
        self.cur.read_exact(&mut buf).map_err(|_| self.truncated())?;
        Ok(buf)
    }
}

fn parse_header(rdr: &mut ClassReader, klass: &mut ParsedClass) -> Result<()> {
    let magic = rdr.read_u32()?;
    if magic != MAGIC {
        return Err(cfe!(rdr.sink, "invalid magic number: 0x{magic:08X}"));
    }
    klass.minor_version = rdr.read_u16()?;
    klass.major_version = rdr.read_u16()?;
    if !(MIN_SUPPORTED_MAJOR..=MAX_SUPPORTED_MAJOR).contains(&klass.major_version) {
        return Err(cfe!(
            rdr.sink,
            "unsupported class file major version {}",
            klass.major_version
        ));
    }
    Ok(())
}

fn parse_constant_pool(rdr: &mut ClassReader, klass: &mut ParsedClass) -> Result<()> {
    let cp_count = rdr.read_u16()? as usize;
    klass.cp_count = cp_count;

    let mut entries = Vec::with_capacity(cp_count);
    entries.push(CpEntry::Dummy); // reserved slot 0

    // ClassRef name indices can point forward in the pool, so they are
    // collected here and resolved once the whole pool is in memory.
    let mut pending_class_refs: Vec<(usize, u16)> = Vec::new();

    while entries.len() < cp_count {
        let tag = rdr.read_u8()?;
        match tag {
            1 => {
                let length = rdr.read_u16()? as usize;
                entries.push(CpEntry::Utf8(rdr.read_bytes(length)?));
            }
            3 => entries.push(CpEntry::IntConst(rdr.read_i32()?)),
            4 => entries.push(CpEntry::FloatConst(f32::from_bits(rdr.read_u32()?))),
            5 => {
                entries.push(CpEntry::LongConst(rdr.read_i64()?));
                entries.push(CpEntry::Dummy);
            }
            6 => {
                entries.push(CpEntry::DoubleConst(f64::from_bits(rdr.read_u64()?)));
                entries.push(CpEntry::Dummy);
            }
            7 => {
                let name_index = rdr.read_u16()?;
                pending_class_refs.push((entries.len(), name_index));
                entries.push(CpEntry::ClassRef {
                    name_index: string_pool::INVALID_STRING_INDEX,
                });
            }
            8 => entries.push(CpEntry::StringConst {
                utf8_index: rdr.read_u16()?,
            }),
            9 => entries.push(CpEntry::FieldRef {
                class_index: rdr.read_u16()?,
                name_and_type_index: rdr.read_u16()?,
            }),
            10 => entries.push(CpEntry::MethodRef {
                class_index: rdr.read_u16()?,
                name_and_type_index: rdr.read_u16()?,
            }),
            11 => entries.push(CpEntry::InterfaceMethodRef {
                class_index: rdr.read_u16()?,
                name_and_type_index: rdr.read_u16()?,
            }),
            12 => entries.push(CpEntry::NameAndType {
                name_index: rdr.read_u16()?,
                desc_index: rdr.read_u16()?,
            }),
            15 => entries.push(CpEntry::MethodHandle {
                ref_kind: rdr.read_u8()?,
                ref_index: rdr.read_u16()?,
            }),
            16 => entries.push(CpEntry::MethodType {
                desc_index: rdr.read_u16()?,
            }),
            17 => entries.push(CpEntry::Dynamic {
                bootstrap_index: rdr.read_u16()?,
                name_and_type_index: rdr.read_u16()?,
            }),
            18 => entries.push(CpEntry::InvokeDynamic {
                bootstrap_index: rdr.read_u16()?,
                name_and_type_index: rdr.read_u16()?,
            }),
            19 => entries.push(CpEntry::Module {
                name_index: rdr.read_u16()?,
            }),
            20 => entries.push(CpEntry::Package {
                name_index: rdr.read_u16()?,
            }),
            _ => {
                return Err(cfe!(
                    rdr.sink,
                    "invalid constant pool tag {} in slot {}",
                    tag,
                    entries.len()
                ))
            }
        }
    }

    if entries.len() != cp_count {
        return Err(cfe!(
            rdr.sink,
            "constant pool overran its declared count of {cp_count}"
        ));
    }

    klass.cp = ConstantPool { entries };

    for (slot, name_index) in pending_class_refs {
        let name = klass.cp.utf8_str(name_index).ok_or_else(|| {
            cfe!(
                rdr.sink,
                "ClassRef in CP slot {slot} points to invalid UTF8 entry {name_index}"
            )
        })?;
        let pool_index = string_pool::get_or_insert(normalize_class_reference(name));
        klass.cp.entries[slot] = CpEntry::ClassRef {
            name_index: pool_index,
        };
    }
    Ok(())
}

fn class_name_at(rdr: &ClassReader, klass: &ParsedClass, cp_index: u16) -> Result<u32> {
    match klass.cp.fetch(cp_index) {
        Some(CpEntry::ClassRef { name_index }) => Ok(*name_index),
        Some(other) => Err(cfe!(
            rdr.sink,
            "CP entry {} should be a ClassRef but is a {}",
            cp_index,
            other.kind_name()
        )),
        None => Err(cfe!(
            rdr.sink,
            "CP entry {} is out of range for a class reference",
            cp_index
        )),
    }
}

fn parse_this_and_super(rdr: &mut ClassReader, klass: &mut ParsedClass) -> Result<()> {
    let this_class = rdr.read_u16()?;
    klass.class_name_index = class_name_at(rdr, klass, this_class)?;
    klass.class_name = string_pool::get(klass.class_name_index)
        .map(|s| s.to_string())
        .unwrap_or_default();

    let super_class = rdr.read_u16()?;
    klass.superclass_index = if super_class == 0 {
        // Only java/lang/Object and module-info carry no superclass; the
        // reserved pool handle terminates the superclass walk either way.
        string_pool::OBJECT_POOL_STRING_INDEX
    } else {
        class_name_at(rdr, klass, super_class)?
    };
    Ok(())
}

fn parse_interfaces(rdr: &mut ClassReader, klass: &mut ParsedClass) -> Result<()> {
    let count = rdr.read_u16()? as usize;
    klass.interface_count = count;
    for _ in 0..count {
        let cp_index = rdr.read_u16()?;
        klass.interfaces.push(class_name_at(rdr, klass, cp_index)?);
    }
    Ok(())
}

fn attr_name<'k>(rdr: &ClassReader, klass: &'k ParsedClass, name_index: u16) -> Result<&'k str> {
    klass.cp.utf8_str(name_index).ok_or_else(|| {
        cfe!(
            rdr.sink,
            "attribute name index {name_index} does not point to a UTF8 entry"
        )
    })
}

fn parse_raw_attr(rdr: &mut ClassReader, name_index: u16) -> Result<Attr> {
    let length = rdr.read_u32()? as usize;
    Ok(Attr {
        name_index,
        content: rdr.read_bytes(length)?,
    })
}

fn parse_fields(rdr: &mut ClassReader, klass: &mut ParsedClass) -> Result<()> {
    use super::defs::access_flags::ACC_STATIC;

    let count = rdr.read_u16()? as usize;
    klass.field_count = count;
    for _ in 0..count {
        let mut field = Field {
            access_flags: rdr.read_u16()?,
            name_index: rdr.read_u16()?,
            desc_index: rdr.read_u16()?,
            ..Field::default()
        };
        field.is_static = field.access_flags & ACC_STATIC != 0;

        let attr_count = rdr.read_u16()? as usize;
        for _ in 0..attr_count {
            let name_index = rdr.read_u16()?;
            let attr = parse_raw_attr(rdr, name_index)?;
            match attr_name(rdr, klass, name_index)? {
                "ConstantValue" if attr.content.len() == 2 => {
                    field.const_value_index =
                        Some(u16::from_be_bytes([attr.content[0], attr.content[1]]));
                }
                _ => field.attributes.push(attr),
            }
        }
        klass.fields.push(field);
    }
    Ok(())
}

fn parse_methods(rdr: &mut ClassReader, klass: &mut ParsedClass) -> Result<()> {
    let count = rdr.read_u16()? as usize;
    klass.method_count = count;
    for _ in 0..count {
        let mut method = Method {
            access_flags: rdr.read_u16()?,
            name_index: rdr.read_u16()?,
            desc_index: rdr.read_u16()?,
            ..Method::default()
        };

        let attr_count = rdr.read_u16()? as usize;
        for _ in 0..attr_count {
            let name_index = rdr.read_u16()?;
            match attr_name(rdr, klass, name_index)? {
                attribute_names::CODE => {
                    let _length = rdr.read_u32()?;
                    method.code = Some(parse_code_attr(rdr, klass)?);
                }
                attribute_names::EXCEPTIONS => {
                    let _length = rdr.read_u32()?;
                    let exc_count = rdr.read_u16()? as usize;
                    for _ in 0..exc_count {
                        method.exceptions.push(rdr.read_u16()?);
                    }
                }
                attribute_names::METHOD_PARAMETERS => {
                    let _length = rdr.read_u32()?;
                    let param_count = rdr.read_u8()? as usize;
                    for _ in 0..param_count {
                        let name_index = rdr.read_u16()?;
                        let access_flags = rdr.read_u16()?;
                        let name = if name_index == 0 {
                            String::new() // legitimately anonymous
                        } else {
                            attr_name(rdr, klass, name_index)?.to_string()
                        };
                        method.parameters.push(MethodParameter { name, access_flags });
                    }
                }
                attribute_names::DEPRECATED => {
                    let _length = rdr.read_u32()?;
                    method.deprecated = true;
                }
                _ => method.attributes.push(parse_raw_attr(rdr, name_index)?),
            }
        }
        klass.methods.push(method);
    }
    Ok(())
}

fn parse_code_attr(rdr: &mut ClassReader, klass: &ParsedClass) -> Result<CodeAttr> {
    let mut code_attr = CodeAttr {
        max_stack: rdr.read_u16()?,
        max_locals: rdr.read_u16()?,
        ..CodeAttr::default()
    };

    let code_length = rdr.read_u32()? as usize;
    code_attr.code = rdr.read_bytes(code_length)?;

    let exc_count = rdr.read_u16()? as usize;
    for _ in 0..exc_count {
        code_attr.exceptions.push(CodeException {
            start_pc: rdr.read_u16()?,
            end_pc: rdr.read_u16()?,
            handler_pc: rdr.read_u16()?,
            catch_type: rdr.read_u16()?,
        });
    }

    let attr_count = rdr.read_u16()? as usize;
    for _ in 0..attr_count {
        let name_index = rdr.read_u16()?;
        let attr = parse_raw_attr(rdr, name_index)?;
        if attr_name(rdr, klass, name_index)? == attribute_names::LINE_NUMBER_TABLE {
            code_attr.line_table = decode_line_number_table(&attr.content);
        }
        code_attr.attributes.push(attr);
    }
    Ok(code_attr)
}

/// Best-effort decode of a LineNumberTable payload; a malformed table is
/// dropped rather than failing the class, since it is purely diagnostic.
fn decode_line_number_table(content: &[u8]) -> Option<Vec<BytecodeToSourceLine>> {
    if content.len() < 2 {
        return None;
    }
    let rows = u16::from_be_bytes([content[0], content[1]]) as usize;
    if content.len() != 2 + rows * 4 {
        return None;
    }
    let mut table = Vec::with_capacity(rows);
    for row in 0..rows {
        let base = 2 + row * 4;
        table.push(BytecodeToSourceLine {
            byte_pc: u16::from_be_bytes([content[base], content[base + 1]]),
            source_line: u16::from_be_bytes([content[base + 2], content[base + 3]]),
        });
    }
    Some(table)
}

fn parse_class_attributes(rdr: &mut ClassReader, klass: &mut ParsedClass) -> Result<()> {
    let count = rdr.read_u16()? as usize;
    klass.attrib_count = count;
    for _ in 0..count {
        let name_index = rdr.read_u16()?;
        let attr = parse_raw_attr(rdr, name_index)?;
        let name = attr_name(rdr, klass, name_index)?.to_string();
        match name.as_str() {
            attribute_names::SOURCE_FILE if attr.content.len() == 2 => {
                let source_index = u16::from_be_bytes([attr.content[0], attr.content[1]]);
                klass.source_file = klass
                    .cp
                    .utf8_str(source_index)
                    .unwrap_or_default()
                    .to_string();
                klass.attributes.push(attr);
            }
            attribute_names::BOOTSTRAP_METHODS => {
                decode_bootstrap_methods(rdr, klass, &attr.content)?;
                klass.attributes.push(attr);
            }
            attribute_names::DEPRECATED => {
                klass.deprecated = true;
                klass.attributes.push(attr);
            }
            _ => klass.attributes.push(attr),
        }
    }
    klass.bootstrap_count = klass.bootstraps.len();
    Ok(())
}

fn decode_bootstrap_methods(
    rdr: &ClassReader,
    klass: &mut ParsedClass,
    content: &[u8],
) -> Result<()> {
    let mut cur = Cursor::new(content);
    let truncated = || {
        cfe!(
            rdr.sink,
            "BootstrapMethods attribute truncated ({} bytes)",
            content.len()
        )
    };

    let count = cur.read_u16::<BigEndian>().map_err(|_| truncated())? as usize;
    for _ in 0..count {
        let method_ref = cur.read_u16::<BigEndian>().map_err(|_| truncated())?;
        let arg_count = cur.read_u16::<BigEndian>().map_err(|_| truncated())? as usize;
        let mut args = Vec::with_capacity(arg_count);
        for _ in 0..arg_count {
            args.push(cur.read_u16::<BigEndian>().map_err(|_| truncated())?);
        }
        klass.bootstraps.push(BootstrapMethod { method_ref, args });
    }
    Ok(())
}
