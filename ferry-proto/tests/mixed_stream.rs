//! Message and file frames interleaved on one byte stream.

use std::io::{self, Read};

use ferry_proto::{
    Command, FILE_HEADER_LEN, LEN_PREFIX, Message, decode_file, decode_message, encode_file,
    encode_message, send_message,
};

/// Hands out one byte per read, like a congested socket.
struct OneByte<R>(R);

impl<R: Read> Read for OneByte<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(1);
        self.0.read(&mut buf[..n])
    }
}

#[test]
fn set_sequence_decodes_over_one_byte_reads() {
    let dir = tempfile::tempdir().unwrap();

    let mut stream = Vec::new();
    send_message(&mut stream, &Command::Set.into()).unwrap();
    stream.extend(encode_file("c.txt", b"third file").unwrap());
    send_message(&mut stream, &Command::List.into()).unwrap();

    let mut r = OneByte(io::Cursor::new(stream));
    assert_eq!(
        Command::from_message(&decode_message(&mut r).unwrap()),
        Some(Command::Set)
    );
    let path = decode_file(&mut r, dir.path()).unwrap();
    assert_eq!(std::fs::read(path).unwrap(), b"third file");
    assert_eq!(
        Command::from_message(&decode_message(&mut r).unwrap()),
        Some(Command::List)
    );
    assert!(ferry_proto::try_decode_message(&mut r).unwrap().is_none());
}

#[test]
fn frame_sizes_add_up() {
    let cmd = encode_message(&Message::Text("GET".into())).unwrap();
    let name = encode_message(&Message::Text("a.txt".into())).unwrap();
    let file = encode_file("a.txt", b"hello").unwrap();

    // version byte + variant tag + varint length + bytes
    assert_eq!(cmd.len(), LEN_PREFIX + 1 + 1 + 1 + 3);
    assert_eq!(name.len(), LEN_PREFIX + 1 + 1 + 1 + 5);
    assert_eq!(file.len(), FILE_HEADER_LEN + 5);
}
