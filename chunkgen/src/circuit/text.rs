use itertools::Itertools;
use paulimap::Basis;
use std::fmt::{self, Display, Write};
use std::str::FromStr;

use super::{Circuit, Instruction, Operation, Target};
use crate::error::{ChunkError, Result};
use crate::gate::Gate;

const INDENT: &str = "    ";

impl Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Qubit(qubit) => write!(f, "{qubit}"),
            Target::Pauli(basis, qubit) => write!(f, "{basis}{qubit}"),
            Target::Combiner => write!(f, "*"),
            Target::Record(lookback) => write!(f, "rec[-{lookback}]"),
        }
    }
}

fn format_arg(value: f64) -> String {
    // `{}` prints -0.0 as "-0"
    if value == 0.0 {
        "0".to_owned()
    } else {
        format!("{value}")
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.gate.name())?;
        if !self.args.is_empty() {
            write!(f, "({})", self.args.iter().map(|arg| format_arg(*arg)).join(", "))?;
        }
        let mut previous = None;
        for target in &self.targets {
            let glued = *target == Target::Combiner || previous == Some(Target::Combiner);
            if !glued {
                f.write_char(' ')?;
            }
            write!(f, "{target}")?;
            previous = Some(*target);
        }
        Ok(())
    }
}

impl Circuit {
    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = INDENT.repeat(depth);
        for operation in &self.operations {
            match operation {
                Operation::Instruction(instruction) => writeln!(f, "{indent}{instruction}")?,
                Operation::Repeat { repetitions, body } => {
                    writeln!(f, "{indent}REPEAT {repetitions} {{")?;
                    body.write_indented(f, depth + 1)?;
                    writeln!(f, "{indent}}}")?;
                }
            }
        }
        Ok(())
    }
}

impl Display for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

impl FromStr for Circuit {
    type Err = ChunkError;

    fn from_str(s: &str) -> Result<Self> {
        let mut lines = s.lines().enumerate().map(|(index, line)| (index + 1, line));
        parse_block(&mut lines, None)
    }
}

fn parse_error(line: usize, message: impl Into<String>) -> ChunkError {
    ChunkError::Parse {
        line,
        message: message.into(),
    }
}

/// Parses lines until the end of input, or until the `}` closing the block opened at `opened_at`.
fn parse_block<'a>(lines: &mut impl Iterator<Item = (usize, &'a str)>, opened_at: Option<usize>) -> Result<Circuit> {
    let mut circuit = Circuit::new();
    while let Some((number, raw)) = lines.next() {
        let line = raw.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        if line == "}" {
            return match opened_at {
                Some(_) => Ok(circuit),
                None => Err(parse_error(number, "unmatched '}'")),
            };
        }
        if let Some(rest) = line.strip_prefix("REPEAT") {
            let count = rest
                .trim()
                .strip_suffix('{')
                .map(str::trim)
                .ok_or_else(|| parse_error(number, "expected 'REPEAT <count> {'"))?;
            let repetitions: u64 = count
                .parse()
                .map_err(|_| parse_error(number, format!("bad repetition count {count:?}")))?;
            let body = parse_block(lines, Some(number))?;
            circuit.append_repeat(repetitions, body);
            continue;
        }
        circuit.push(parse_instruction(number, line)?);
    }
    match opened_at {
        Some(line) => Err(parse_error(line, "REPEAT block is never closed")),
        None => Ok(circuit),
    }
}

fn parse_instruction(number: usize, line: &str) -> Result<Instruction> {
    let name_end = line.find(|c: char| c == '(' || c.is_whitespace()).unwrap_or(line.len());
    let gate: Gate = line[..name_end]
        .parse()
        .map_err(|error: ChunkError| parse_error(number, error.to_string()))?;
    let mut rest = line[name_end..].trim_start();

    let mut args = Vec::new();
    if let Some(after_open) = rest.strip_prefix('(') {
        let close = after_open
            .find(')')
            .ok_or_else(|| parse_error(number, "unclosed argument list"))?;
        for arg in after_open[..close].split(',').map(str::trim).filter(|a| !a.is_empty()) {
            args.push(
                arg.parse::<f64>()
                    .map_err(|_| parse_error(number, format!("bad argument {arg:?}")))?,
            );
        }
        rest = &after_open[close + 1..];
    }

    let mut targets = Vec::new();
    for token in rest.split_whitespace() {
        if gate == Gate::Mpp {
            for (index, factor) in token.split('*').enumerate() {
                if index > 0 {
                    targets.push(Target::Combiner);
                }
                targets.push(parse_target(number, factor)?);
            }
        } else {
            targets.push(parse_target(number, token)?);
        }
    }
    Instruction::new(gate, targets, args).map_err(|error| parse_error(number, error.to_string()))
}

fn parse_target(number: usize, token: &str) -> Result<Target> {
    let bad = || parse_error(number, format!("bad target {token:?}"));
    if let Some(lookback) = token.strip_prefix("rec[-").and_then(|t| t.strip_suffix(']')) {
        return lookback.parse().map(Target::Record).map_err(|_| bad());
    }
    if let Ok(qubit) = token.parse() {
        return Ok(Target::Qubit(qubit));
    }
    let mut characters = token.chars();
    let basis = characters.next().and_then(|c| Basis::try_from(c).ok()).ok_or_else(bad)?;
    let qubit = characters.as_str().parse().map_err(|_| bad())?;
    Ok(Target::Pauli(basis, qubit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let text = "\
QUBIT_COORDS(0, -0.5) 0
R 0 1
TICK
CX 0 1
MPP X0*Y1 Z2
REPEAT 2 {
    M(0.001) 0
    DETECTOR(0.5, 0, 1) rec[-1] rec[-2]
}
OBSERVABLE_INCLUDE(0) rec[-1]
";
        let circuit: Circuit = text.parse().unwrap();
        assert_eq!(circuit.to_string(), text);
    }

    #[test]
    fn comments_and_aliases() {
        let circuit: Circuit = "CNOT 0 1 # entangle\n\nH_XZ 2".parse().unwrap();
        assert_eq!(circuit.to_string(), "CX 0 1\nH 2\n");
    }

    #[test]
    fn parse_errors_name_the_line() {
        let error = "H 0\nFOO 1".parse::<Circuit>().unwrap_err();
        assert!(matches!(error, ChunkError::Parse { line: 2, .. }));
        assert!("REPEAT 2 {\nH 0".parse::<Circuit>().is_err());
        assert!("}".parse::<Circuit>().is_err());
        assert!("CX 0".parse::<Circuit>().is_err());
        assert!("M !0".parse::<Circuit>().is_err());
    }
}
