use std::io::{self, Write};

const LINE_LEN: usize = 16;

/// Prints `data` 16 bytes per line, `hexdump -C` style with an 8 digit offset.
pub fn write_hex<W: Write>(out: &mut W, data: &[u8]) -> io::Result<()> {
    for (line, chunk) in data.chunks(LINE_LEN).enumerate() {
        write!(out, "{:08x}", line * LINE_LEN)?;
        for i in 0..LINE_LEN {
            if i == 8 {
                write!(out, " ")?;
            }
            match chunk.get(i) {
                Some(byte) => write!(out, " {:02x}", byte)?,
                None => write!(out, "   ")?,
            }
        }
        write!(out, "  |")?;
        for byte in chunk {
            let c = if (0x20..=0x7e).contains(byte) {
                *byte as char
            } else {
                '.'
            };
            write!(out, "{}", c)?;
        }
        writeln!(out, "|")?;
    }
    Ok(())
}
