use std::io::{self, Write};

use it6251::VideoReport;

/// Prints link state, system state and, with stable video, the decoded mode.
pub fn write_video_report<W: Write>(out: &mut W, report: &VideoReport) -> io::Result<()> {
    let link = report.link;
    if link.trained() {
        writeln!(out, "reg0E = {:02x}, Link Rate = {}", link.0, link.rate())?;
    } else {
        writeln!(out, "Link Training has something wrong, reg0E = {:02x}", link.0)?;
    }

    let system = report.system;
    writeln!(
        out,
        "reg0D = {:02x}, {} {} {}",
        system.0,
        if system.interrupt() { "Interrupt!" } else { "" },
        if system.hpd() { "HPD" } else { "Unplug" },
        if system.video_stable() {
            "Video Stable"
        } else {
            "Video Unstable"
        }
    )?;

    let Some(timing) = &report.timing else {
        return Ok(());
    };
    match timing.pixel_clock_khz {
        Some(khz) => writeln!(out, "frequency = {}, xCnt = {}", khz, timing.clock_count)?,
        None => writeln!(out, "frequency = unavailable, xCnt = {}", timing.clock_count)?,
    }
    writeln!(
        out,
        "Data Enable start: ({}, {})",
        timing.hde_start, timing.vde_start
    )?;
    match timing.modeline() {
        Ok(modeline) => writeln!(out, "{}", modeline)?,
        Err(e) => {
            log::error!("Mode decode failed: {}", e);
            writeln!(out, "Modeline unavailable: {}", e)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use it6251::video::{LinkStatus, SystemStatus};
    use it6251::VideoTiming;

    fn render(report: &VideoReport) -> String {
        let mut out = Vec::new();
        write_video_report(&mut out, report).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn timing_720p() -> VideoTiming {
        VideoTiming {
            htotal: 1650,
            hde_start: 260,
            hactive: 1280,
            hfront_porch: 110,
            hsync_len: 40,
            vtotal: 750,
            vde_start: 25,
            vactive: 720,
            vfront_porch: 5,
            vsync_len: 5,
            hsync_negative: false,
            vsync_negative: false,
            interlaced: false,
            clock_count: 373,
            pixel_clock_khz: Some(74123),
        }
    }

    #[test]
    fn unplugged_sink() {
        let report = VideoReport {
            system: SystemStatus(0x00),
            link: LinkStatus(0x01),
            timing: None,
        };
        assert_eq!(
            render(&report),
            "Link Training has something wrong, reg0E = 01\nreg0D = 00,  Unplug Video Unstable\n"
        );
    }

    #[test]
    fn stable_720p() {
        let report = VideoReport {
            system: SystemStatus(0x07),
            link: LinkStatus(0x90),
            timing: Some(timing_720p()),
        };
        let text = render(&report);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "reg0E = 90, Link Rate = HBR",
                "reg0D = 07, Interrupt! HPD Video Stable",
                "frequency = 74123, xCnt = 373",
                "Data Enable start: (260, 25)",
                "Modeline \"1280x720\" 74.123  1280 1390 1430 1650  720 725 730 750 +HSync +VSync",
            ]
        );
    }

    #[test]
    fn bad_timing_is_reported_not_fatal() {
        let mut timing = timing_720p();
        timing.vtotal = 700;
        timing.pixel_clock_khz = None;
        let report = VideoReport {
            system: SystemStatus(0x06),
            link: LinkStatus(0x10),
            timing: Some(timing),
        };
        let text = render(&report);
        assert!(text.contains("frequency = unavailable, xCnt = 373\n"));
        assert!(text.contains("Modeline unavailable: vertical timing does not add up"));
    }
}
