// ============================================================================
// OPTION PRINTERS - human-readable read-back of native encoder options
// ============================================================================
//
// Each printer formats one line `[codec] <text>: <value>` and appends a
// ` <Default>` marker when the option is still at its default.  Read failures
// are printed inline as `<Error: ...>`, never propagated.

use super::context::CodecContext;

/// Collects the lines of one `log_options` run and mirrors them to the log.
pub struct OptionLog<'a> {
    context: &'a dyn CodecContext,
    lines: Vec<String>,
}

impl<'a> OptionLog<'a> {
    pub fn new(context: &'a dyn CodecContext) -> Self {
        Self {
            context,
            lines: Vec::new(),
        }
    }

    fn push(&mut self, text: String) {
        let line = format!("[{}] {}", self.context.codec().name, text);
        log::info!("{}", line);
        self.lines.push(line);
    }

    fn default_marker(&self, option: &str) -> &'static str {
        if self.context.opt_is_default(option) {
            " <Default>"
        } else {
            ""
        }
    }

    /// Section heading.
    pub fn heading(&mut self, text: &str) {
        self.push(format!("{}:", text));
    }

    /// `Enabled` / `Disabled`; `inverse` for options named after the negation
    /// of what they are shown as (`no-scenecut` as adaptive I-frames).
    pub fn print_option_bool(&mut self, option: &str, text: &str, inverse: bool) {
        let line = match self.context.opt_get_int(option) {
            Ok(v) => {
                let disabled = if inverse { v != 0 } else { v == 0 };
                format!(
                    "{}: {}{}",
                    text,
                    if disabled { "Disabled" } else { "Enabled" },
                    self.default_marker(option)
                )
            }
            Err(e) => format!("{}: <Error: {}>", text, e),
        };
        self.push(line);
    }

    pub fn print_option_int(&mut self, option: &str, text: &str, suffix: &str) {
        let marker = self.default_marker(option);
        let line = match self.context.opt_get_int(option) {
            Ok(v) => format!("{}: {} {}{}", text, v, suffix, marker),
            Err(_) if !marker.is_empty() => format!("{}: <Default>", text),
            Err(e) => format!("{}: <Error: {}>", text, e),
        };
        self.push(line);
    }

    /// Prints the unit constant name of the current value, or `<Unknown>`.
    /// Options without a unit print the raw number.
    pub fn print_option_string(&mut self, option: &str, text: &str) {
        let line = match self.context.opt_get_int(option) {
            Ok(v) => match self.context.opt_unit(option) {
                Some(unit) => format!(
                    "{}: {}{}",
                    text,
                    self.context
                        .name_from_unit_value(unit, v)
                        .unwrap_or("<Unknown>"),
                    self.default_marker(option)
                ),
                None => format!("{}: {}{}", text, v, self.default_marker(option)),
            },
            Err(e) => format!("{}: <Error: {}>", text, e),
        };
        self.push(line);
    }

    pub fn finish(self) -> Vec<String> {
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::codecs::{AMF_HEVC, H264_NVENC};
    use crate::encoder::context::OptionContext;

    #[test]
    fn marks_defaults_and_formats_values() {
        let mut ctx = OptionContext::new(&H264_NVENC);
        ctx.opt_set_int("rc-lookahead", 8).unwrap();

        let mut log = OptionLog::new(&ctx);
        log.print_option_string("preset", "Preset");
        log.print_option_int("rc-lookahead", "Look-Ahead", "Frames");
        log.print_option_bool("no-scenecut", "Adaptive I-Frames", true);
        log.print_option_string("rc", "Rate Control");
        let lines = log.finish();

        assert_eq!(lines[0], "[h264_nvenc] Preset: p4 <Default>");
        assert_eq!(lines[1], "[h264_nvenc] Look-Ahead: 8 Frames");
        assert_eq!(lines[2], "[h264_nvenc] Adaptive I-Frames: Enabled <Default>");
        assert_eq!(lines[3], "[h264_nvenc] Rate Control: <Unknown> <Default>");
    }

    #[test]
    fn missing_options_print_errors() {
        let ctx = OptionContext::new(&AMF_HEVC);
        let mut log = OptionLog::new(&ctx);
        log.print_option_bool("qp_b", "B-Frame", false);
        let lines = log.finish();
        assert!(lines[0].starts_with("[amf_hevc] B-Frame: <Error: "));
    }
}
