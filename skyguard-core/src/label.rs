//! Operator labels
//!
//! The true cloud class comes from a person looking at the sky or the camera
//! image. An empty answer means "don't know" and aborts the cycle without
//! touching any file.

use std::io::{BufRead, Write};

use crate::classifier::CloudClass;
use crate::errors::{SkyGuardError, SkyGuardResult};
use crate::station::Measurement;

/// Provider of the true class for the current reading
pub trait LabelSource {
    /// `Some(class)`, or `None` to abort the cycle
    fn request_label(&mut self, measurement: &Measurement) -> SkyGuardResult<Option<CloudClass>>;
}

/// Always answers with the same label
#[derive(Debug, Clone, Copy)]
pub struct FixedLabel(pub Option<CloudClass>);

impl LabelSource for FixedLabel {
    fn request_label(&mut self, _measurement: &Measurement) -> SkyGuardResult<Option<CloudClass>> {
        Ok(self.0)
    }
}

/// Interactive line prompt
///
/// Repeats the question on invalid input. An empty line or end of input
/// aborts.
#[derive(Debug)]
pub struct PromptLabelSource<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptLabelSource<R, W> {
    /// Prompt reading from `input`, writing to `output`
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Give back the writer
    pub fn into_output(self) -> W {
        self.output
    }

    fn print_legend(&mut self, measurement: &Measurement) -> std::io::Result<()> {
        let reading = measurement.reading;
        writeln!(self.output, "Measurement")?;
        writeln!(self.output, "Ta Ambient : {} °C", reading.ambient)?;
        writeln!(self.output, "Ts Object  : {} °C", reading.object)?;
        writeln!(self.output, "Delta      : {} °C", reading.delta())?;
        writeln!(self.output, "Tsky       : {:.2} °C", measurement.sky_temperature)?;
        writeln!(self.output, "Prediction : {}", measurement.predicted)?;
        writeln!(self.output)?;
        writeln!(self.output, "Please enter true cloud status:")?;
        for class in CloudClass::ALL {
            writeln!(self.output, "{} = {}", class.index(), class.name())?;
        }
        Ok(())
    }
}

/// Parse one answer; `Ok(None)` for an empty answer
pub fn parse_label(answer: &str) -> SkyGuardResult<Option<CloudClass>> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Ok(None);
    }
    answer
        .parse::<i64>()
        .ok()
        .and_then(|index| CloudClass::from_index(index).ok())
        .map(Some)
        .ok_or_else(|| SkyGuardError::InvalidLabel(answer.to_string()))
}

impl<R: BufRead, W: Write> LabelSource for PromptLabelSource<R, W> {
    fn request_label(&mut self, measurement: &Measurement) -> SkyGuardResult<Option<CloudClass>> {
        self.print_legend(measurement)?;

        loop {
            write!(self.output, "Label (0-3, Enter = abort): ")?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(None);
            }

            match parse_label(&line) {
                Ok(label) => return Ok(label),
                Err(_) => writeln!(self.output, "Invalid input. Enter 0-3 or Enter.")?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficients::CoefficientSet;
    use crate::sensor::Reading;
    use std::io::Cursor;

    fn ask(input: &str) -> (Option<CloudClass>, String) {
        let measurement = Measurement::new(Reading::new(4.51, -17.23), &CoefficientSet::default());
        let mut prompt = PromptLabelSource::new(Cursor::new(input.to_string()), Vec::new());
        let label = prompt.request_label(&measurement).unwrap();
        (label, String::from_utf8(prompt.into_output()).unwrap())
    }

    #[test]
    fn accepts_valid_label() {
        let (label, output) = ask("2\n");
        assert_eq!(label, Some(CloudClass::HeavyClouds));
        assert!(output.contains("3 = overcast"));
        assert!(output.contains("Prediction : 1 (light clouds)"));
        assert!(output.contains("Delta      : -21.74 °C"));
    }

    #[test]
    fn reprompts_on_invalid_input() {
        let (label, output) = ask("7\nfoo\n 0 \n");
        assert_eq!(label, Some(CloudClass::Clear));
        assert_eq!(output.matches("Invalid input").count(), 2);
    }

    #[test]
    fn empty_line_or_eof_aborts() {
        assert_eq!(ask("\n").0, None);
        assert_eq!(ask("").0, None);
        assert_eq!(ask("x\n").0, None);
    }

    #[test]
    fn parse_answers() {
        assert_eq!(parse_label("3").unwrap(), Some(CloudClass::Overcast));
        assert_eq!(parse_label("  ").unwrap(), None);
        assert!(matches!(parse_label("-1"), Err(SkyGuardError::InvalidLabel(s)) if s == "-1"));
        assert!(parse_label("1.5").is_err());
    }
}
