//! buf 类型：字节序列的拼接、编辑与编码

use super::{arg, binary, call, NativeCtx, NativeDef};
use crate::compiler::parser::BinaryOp;
use crate::runtime::fault::Fault;
use crate::runtime::value::Value;

type NativeResult = Result<Option<Value>, Fault>;

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

// ===== 编码 =====

pub fn encode_base64(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(3) * 4);
    for chunk in data.chunks(3) {
        let b = [
            chunk[0],
            chunk.get(1).copied().unwrap_or(0),
            chunk.get(2).copied().unwrap_or(0),
        ];
        let n = (u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2]);
        for i in 0..4 {
            if i <= chunk.len() {
                out.push(BASE64_ALPHABET[(n >> (18 - 6 * i) & 0x3f) as usize] as char);
            } else {
                out.push('=');
            }
        }
    }
    out
}

pub fn decode_base64(text: &str) -> Option<Vec<u8>> {
    let text = text.trim_end_matches('=');
    let mut out = Vec::with_capacity(text.len() * 3 / 4);
    let mut acc: u32 = 0;
    let mut bits = 0;
    for c in text.bytes() {
        let digit = BASE64_ALPHABET.iter().position(|a| *a == c)? as u32;
        acc = (acc << 6) | digit;
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            out.push((acc >> bits) as u8);
            acc &= (1 << bits) - 1;
        }
    }
    // 剩余的位必须全为 0，且不能只剩 6 位
    if bits >= 6 || acc != 0 {
        return None;
    }
    Some(out)
}

pub fn encode_hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

pub fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| {
            text.get(i..i + 2)
                .filter(|pair| pair.bytes().all(|b| b.is_ascii_hexdigit()))
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
        })
        .collect()
}

fn base64(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let data = arg(args, 0)?.as_buf()?;
    let text = encode_base64(&data.borrow());
    Ok(Some(Value::str(text)))
}

fn unbase64(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let text = arg(args, 0)?.as_str()?;
    let data = decode_base64(&text).ok_or_else(Fault::invalid_param)?;
    Ok(Some(Value::buf(data)))
}

fn hex(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let data = arg(args, 0)?.as_buf()?;
    let text = encode_hex(&data.borrow());
    Ok(Some(Value::str(text)))
}

fn unhex(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let text = arg(args, 0)?.as_str()?;
    let data = decode_hex(&text).ok_or_else(Fault::invalid_param)?;
    Ok(Some(Value::buf(data)))
}

// ===== 拼接 =====

/// `buf + x`：返回新的 buf，左操作数不变
fn append(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let mut data = arg(args, 0)?.as_buf()?.borrow().clone();
    match arg(args, 1)? {
        Value::Int(byte) => {
            let byte = u8::try_from(*byte).map_err(|_| Fault::byte_out(*byte))?;
            data.push(byte);
        }
        Value::Char(c) => {
            let mut tmp = [0u8; 4];
            data.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
        }
        Value::Str(s) => data.extend_from_slice(s.as_bytes()),
        Value::Buf(other) => data.extend_from_slice(&other.borrow()),
        other => return Err(Fault::internal(format!("buf + {}", other.kind_name()))),
    }
    Ok(Some(Value::buf(data)))
}

// ===== 编辑 =====

/// `Del(buf, off, len)`：负长度表示从 off 向前删除
fn delete(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let target = arg(args, 0)?;
    let mut off = arg(args, 1)?.as_int()?;
    let mut length = arg(args, 2)?.as_int()?;
    let handle = target.as_buf()?;
    let mut data = handle.borrow_mut();
    let size = data.len() as i64;
    if length < 0 {
        off += length;
        length = -length;
    }
    if off < 0 || off > size {
        return Err(Fault::invalid_param());
    }
    let end = (off + length).min(size);
    data.drain(off as usize..end as usize);
    drop(data);
    Ok(Some(target.clone()))
}

fn insert(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let target = arg(args, 0)?;
    let off = arg(args, 1)?.as_int()?;
    let extra = arg(args, 2)?.as_buf()?.borrow().clone();
    let handle = target.as_buf()?;
    let mut data = handle.borrow_mut();
    if off < 0 || off > data.len() as i64 {
        return Err(Fault::invalid_param());
    }
    let off = off as usize;
    data.splice(off..off, extra);
    drop(data);
    Ok(Some(target.clone()))
}

pub(super) fn register(defs: &mut Vec<NativeDef>) {
    defs.extend([
        binary(BinaryOp::Add, "buf,buf", "buf", append),
        binary(BinaryOp::Add, "buf,int", "buf", append),
        binary(BinaryOp::Add, "buf,char", "buf", append),
        binary(BinaryOp::Add, "buf,str", "buf", append),
        call("Base64", "buf", "str", base64),
        call("UnBase64", "str", "buf", unbase64),
        call("Hex", "buf", "str", hex),
        call("UnHex", "str", "buf", unhex),
        call("Del", "buf,int,int", "buf", delete),
        call("Insert", "buf,int,buf", "buf", insert),
    ]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::fault::FaultKind;
    use crate::runtime::stdlib::testing::{invoke, value};
    use proptest::prelude::*;

    #[test]
    fn test_base64_known_vectors() {
        for (plain, encoded) in [
            ("", ""),
            ("f", "Zg=="),
            ("fo", "Zm8="),
            ("foo", "Zm9v"),
            ("foobar", "Zm9vYmFy"),
        ] {
            assert_eq!(encode_base64(plain.as_bytes()), encoded);
            assert_eq!(decode_base64(encoded).unwrap(), plain.as_bytes());
        }
        assert!(decode_base64("Z").is_none());
        assert!(decode_base64("Zm9v!").is_none());
    }

    #[test]
    fn test_hex_rejects_odd_length() {
        assert_eq!(encode_hex(&[0, 0xab, 0x10]), "00ab10");
        assert_eq!(decode_hex("00AB10").unwrap(), vec![0, 0xab, 0x10]);
        assert!(decode_hex("abc").is_none());
        assert!(decode_hex("zz").is_none());
    }

    #[test]
    fn test_append_byte_out_of_range() {
        let buf = Value::buf(vec![1]);
        let err = invoke(append, &[buf.clone(), Value::Int(256)]).unwrap_err();
        assert_eq!(err.kind, FaultKind::ByteOut);
        let joined = value(append, &[buf.clone(), Value::str("ab")]);
        assert_eq!(*joined.as_buf().unwrap().borrow(), vec![1, b'a', b'b']);
        assert_eq!(*buf.as_buf().unwrap().borrow(), vec![1]);
    }

    #[test]
    fn test_del_and_insert() {
        let buf = Value::buf(b"abcdef".to_vec());
        value(delete, &[buf.clone(), Value::Int(1), Value::Int(2)]);
        assert_eq!(&*buf.as_buf().unwrap().borrow(), b"adef");
        value(delete, &[buf.clone(), Value::Int(3), Value::Int(-2)]);
        assert_eq!(&*buf.as_buf().unwrap().borrow(), b"af");
        value(insert, &[buf.clone(), Value::Int(1), Value::buf(b"xy".to_vec())]);
        assert_eq!(&*buf.as_buf().unwrap().borrow(), b"axyf");
        let err = invoke(insert, &[buf, Value::Int(9), Value::buf(vec![])]).unwrap_err();
        assert_eq!(err.kind, FaultKind::InvalidParam);
    }

    proptest! {
        #[test]
        fn prop_encodings_round_trip(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            prop_assert_eq!(decode_base64(&encode_base64(&data)).unwrap(), data.clone());
            prop_assert_eq!(decode_hex(&encode_hex(&data)).unwrap(), data);
        }
    }
}
