//! Image labels

use std::fmt::Display;

use itertools::Itertools;

use crate::fragment::FragmentHeader;

/// Text label describing a decoded image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label<'a> {
    source: &'a str,
    header: &'a FragmentHeader,
    width: usize,
    height: usize,
}

impl<'a> Label<'a> {
    /// Creates a label for a `width` x `height` raster described by `header`
    #[must_use]
    pub const fn new(
        source: &'a str,
        header: &'a FragmentHeader,
        width: usize,
        height: usize,
    ) -> Self {
        Self {
            source,
            header,
            width,
            height,
        }
    }
}

impl Display for Label<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let h = self.header;
        let (seconds, subseconds) = h.timestamp();
        writeln!(f, "decompressed-from {}", self.source)?;
        writeln!(f, "id {} time {seconds}:{subseconds}", h.id)?;
        writeln!(f, "gain 0x{:x} offset {}", h.gain, h.offset)?;
        writeln!(
            f,
            "start {} cross {} down {}",
            usize::from(h.edit_start) * 16,
            usize::from(h.edit_length) * 16,
            usize::from(h.down_total) * 16
        )?;
        writeln!(
            f,
            "cmd {} {}",
            h.command_kind().as_str(),
            h.command.iter().map(|b| format!("{b:02x}")).join("")
        )?;
        writeln!(
            f,
            "sensor {} clocking {} system-id 0x{:x}",
            h.sensors,
            h.clocking(),
            h.system_id()
        )?;
        writeln!(f, "width {} height {}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_every_line() {
        let mut command = [0u8; 17];
        command[0] = 0x01;
        command[16] = 0xab;
        let header = FragmentHeader::builder()
            .id(77)
            .time([3, 0x01, 0x02, 0, 0])
            .gain(0x9a)
            .offset(12)
            .edit_start(2)
            .edit_length(4)
            .down_total(10)
            .command(command)
            .sensors(5)
            .other([0, 0x10, 0x01, 0xc])
            .build();
        let text = Label::new("m0001.sdp", &header, 64, 150).to_string();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            [
                "decompressed-from m0001.sdp",
                "id 77 time 513:3",
                "gain 0x9a offset 12",
                "start 32 cross 64 down 160",
                "cmd na 01000000000000000000000000000000ab",
                "sensor 5 clocking 272 system-id 0xc",
                "width 64 height 150",
            ]
        );
    }
}
