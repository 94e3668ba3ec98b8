//! Patient intake: CLI flags, falling back to interactive prompts.

use std::io::{BufRead, Write};

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Patient {
    pub name: String,
    pub age: String,
    pub gender: String,
}

impl Patient {
    /// Fill in any field not given on the command line by prompting.
    pub fn collect(
        name: Option<String>,
        age: Option<String>,
        gender: Option<String>,
        input: &mut impl BufRead,
        output: &mut impl Write,
    ) -> Result<Self> {
        let name = match name {
            Some(n) => n,
            None => prompt(input, output, "Enter patient name: ")?,
        };
        let age = match age {
            Some(a) => a,
            None => prompt(input, output, "Enter patient age: ")?,
        };
        let gender = match gender {
            Some(g) => g,
            None => prompt(input, output, "Enter patients gender (M/F): ")?,
        };

        let patient = Self {
            name: name.trim().to_string(),
            age: age.trim().to_string(),
            gender: gender.trim().to_uppercase(),
        };
        validate_name(&patient.name)?;
        Ok(patient)
    }
}

fn prompt(input: &mut impl BufRead, output: &mut impl Write, question: &str) -> Result<String> {
    output.write_all(question.as_bytes())?;
    output.flush()?;
    let mut line = String::new();
    input
        .read_line(&mut line)
        .context("failed to read patient details")?;
    Ok(line)
}

/// The name becomes part of the report file names.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("patient name must not be empty");
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." || name.contains('\0') {
        bail!("patient name {name:?} cannot be used in a file name");
    }
    Ok(())
}
