//! Shared helpers for integration tests: tiny hand-assembled class files.

#![allow(dead_code)]

/// Assemble a minimal class file: `class <name> extends <super_name>`,
/// optionally with one `public void run()` method whose body is a single
/// RETURN.
///
/// Constant pool layout:
///   1: Utf8 name          2: Class #1
///   3: Utf8 super_name    4: Class #3
///   5: Utf8 "run"         6: Utf8 "()V"      7: Utf8 "Code"   (method only)
pub fn simple_class(name: &str, super_name: &str, with_method: bool) -> Vec<u8> {
    let mut b: Vec<u8> = Vec::new();
    b.extend(0xCAFEBABEu32.to_be_bytes());
    b.extend(0u16.to_be_bytes()); // minor
    b.extend(52u16.to_be_bytes()); // major: Java 8

    let cp_count: u16 = if with_method { 8 } else { 5 };
    b.extend(cp_count.to_be_bytes());
    push_utf8(&mut b, name); // 1
    push_class(&mut b, 1); // 2
    push_utf8(&mut b, super_name); // 3
    push_class(&mut b, 3); // 4
    if with_method {
        push_utf8(&mut b, "run"); // 5
        push_utf8(&mut b, "()V"); // 6
        push_utf8(&mut b, "Code"); // 7
    }

    b.extend(0x0021u16.to_be_bytes()); // ACC_PUBLIC | ACC_SUPER
    b.extend(2u16.to_be_bytes()); // this_class
    b.extend(4u16.to_be_bytes()); // super_class
    b.extend(0u16.to_be_bytes()); // interfaces_count
    b.extend(0u16.to_be_bytes()); // fields_count

    if with_method {
        b.extend(1u16.to_be_bytes()); // methods_count
        b.extend(0x0001u16.to_be_bytes()); // ACC_PUBLIC
        b.extend(5u16.to_be_bytes()); // name "run"
        b.extend(6u16.to_be_bytes()); // desc "()V"
        b.extend(1u16.to_be_bytes()); // one attribute: Code
        b.extend(7u16.to_be_bytes()); // attr name "Code"
        b.extend(13u32.to_be_bytes()); // attr length
        b.extend(1u16.to_be_bytes()); // max_stack
        b.extend(1u16.to_be_bytes()); // max_locals
        b.extend(1u32.to_be_bytes()); // code_length
        b.push(0xB1); // RETURN
        b.extend(0u16.to_be_bytes()); // exception_table_length
        b.extend(0u16.to_be_bytes()); // code attributes_count
    } else {
        b.extend(0u16.to_be_bytes()); // methods_count
    }

    b.extend(0u16.to_be_bytes()); // class attributes_count
    b
}

fn push_utf8(b: &mut Vec<u8>, s: &str) {
    b.push(1);
    b.extend((s.len() as u16).to_be_bytes());
    b.extend(s.as_bytes());
}

fn push_class(b: &mut Vec<u8>, name_index: u16) {
    b.push(7);
    b.extend(name_index.to_be_bytes());
}
