//! Question-and-answer collection of one patient record.

use crate::records::Record;
use crate::serving::Prediction;
use std::io::{self, BufRead, Write};

const GENDERS: &[&str] = &["Male", "Female"];
const YES_NO: &[&str] = &["Yes", "No"];
const BINARY: &[&str] = &["No (0)", "Yes (1)"];
const WORK_TYPES: &[&str] = &["Private", "Self-employed", "Govt_job", "children", "Never_worked"];
const RESIDENCE_TYPES: &[&str] = &["Urban", "Rural"];
const SMOKING_STATUSES: &[&str] = &["never smoked", "formerly smoked", "smokes", "Unknown"];

pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_line(&mut self) -> io::Result<String> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed before the record was complete",
            ));
        }
        Ok(line.trim().to_string())
    }

    fn ask(&mut self, prompt: &str) -> io::Result<String> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;
        self.read_line()
    }

    /// Re-asks until the answer parses and lies in `[min, max]`. With
    /// `allow_blank`, an empty answer yields `None`.
    pub fn number(
        &mut self,
        prompt: &str,
        min: f64,
        max: Option<f64>,
        allow_blank: bool,
    ) -> io::Result<Option<f64>> {
        loop {
            let answer = self.ask(prompt)?;
            if answer.is_empty() && allow_blank {
                return Ok(None);
            }
            match answer.parse::<f64>() {
                Ok(v) if !v.is_finite() || v < min => {
                    writeln!(self.output, "Value must be at least {min}")?
                }
                Ok(v) if max.is_some_and(|m| v > m) => {
                    writeln!(self.output, "Value must be at most {}", max.unwrap_or(v))?
                }
                Ok(v) => return Ok(Some(v)),
                Err(_) => writeln!(self.output, "Please enter a valid number")?,
            }
        }
    }

    /// Numbered menu; returns the index of the chosen option. On two-option
    /// menus `0` picks the first option, matching the `No (0)` labels.
    pub fn choice(&mut self, prompt: &str, options: &[&str]) -> io::Result<usize> {
        writeln!(self.output, "{prompt}")?;
        for (i, option) in options.iter().enumerate() {
            writeln!(self.output, "{}. {}", i + 1, option)?;
        }
        loop {
            let answer = self.ask("Enter choice (number): ")?;
            match answer.parse::<usize>() {
                Ok(0) if options.len() == 2 => return Ok(0),
                Ok(n) if (1..=options.len()).contains(&n) => return Ok(n - 1),
                Ok(_) => writeln!(
                    self.output,
                    "Please enter a number between 1 and {}",
                    options.len()
                )?,
                Err(_) => writeln!(self.output, "Please enter a valid number")?,
            }
        }
    }

    pub fn collect_record(&mut self) -> io::Result<Record> {
        writeln!(self.output, "\n{}", "=".repeat(50))?;
        writeln!(self.output, "Stroke Risk Prediction - Enter Patient Details")?;
        writeln!(self.output, "{}\n", "=".repeat(50))?;

        let mut record = Record::new();
        let gender = self.choice("Gender:", GENDERS)?;
        record.insert("gender", GENDERS[gender]);
        if let Some(age) = self.number("Age: ", 0.0, Some(120.0), false)? {
            record.insert("age", age);
        }
        let hypertension = self.choice("Hypertension:", BINARY)?;
        record.insert("hypertension", hypertension as i32);
        let heart_disease = self.choice("Heart Disease:", BINARY)?;
        record.insert("heart_disease", heart_disease as i32);
        let married = self.choice("Ever Married:", YES_NO)?;
        record.insert("ever_married", YES_NO[married]);
        let work = self.choice("Work Type:", WORK_TYPES)?;
        record.insert("work_type", WORK_TYPES[work]);
        let residence = self.choice("Residence Type:", RESIDENCE_TYPES)?;
        record.insert("Residence_type", RESIDENCE_TYPES[residence]);
        if let Some(glucose) = self.number("Average Glucose Level (mg/dL): ", 0.0, None, false)? {
            record.insert("avg_glucose_level", glucose);
        }
        if let Some(bmi) = self.number("BMI (blank if unknown): ", 0.0, None, true)? {
            record.insert("bmi", bmi);
        }
        let smoking = self.choice("Smoking Status:", SMOKING_STATUSES)?;
        record.insert("smoking_status", SMOKING_STATUSES[smoking]);
        Ok(record)
    }

    pub fn report(&mut self, prediction: &Prediction) -> io::Result<()> {
        writeln!(self.output, "\n{}", "=".repeat(50))?;
        writeln!(self.output, "Prediction Result")?;
        writeln!(self.output, "{}", "=".repeat(50))?;
        if prediction.label.at_risk() {
            writeln!(self.output, "\nThis patient is at risk of stroke.")?;
        } else {
            writeln!(self.output, "\nThis patient is not at risk of stroke.")?;
        }
        if let Some(p) = prediction.probability {
            writeln!(self.output, "Estimated stroke probability: {:.1}%", p * 100.0)?;
        }
        Ok(())
    }
}
