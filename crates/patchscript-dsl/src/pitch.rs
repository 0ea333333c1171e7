//! Note-name to voltage conversion, 1 V per octave with C4 at 0 V.

use crate::error::DslError;

/// Parses a note name (`"C4"`, `"A#3"`, `"Eb-1"`, …) into volts.
///
/// Letters A–G (either case), any run of `#`/`b` accidentals, then an
/// octave number from -1 to 9. One volt per octave, C4 = 0 V, so `"A4"`
/// is 0.75 V and `"C3"` is -1 V.
pub fn note_volts(name: &str) -> Result<f64, DslError> {
    let invalid = || DslError::InvalidNoteName {
        name: name.to_string(),
    };

    let mut chars = name.chars();
    let letter = chars.next().ok_or_else(invalid)?;
    let semitone: i32 = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return Err(invalid()),
    };

    let rest = chars.as_str();
    let accidental_len = rest
        .chars()
        .take_while(|&c| c == '#' || c == 'b')
        .count();
    let accidental: i32 = rest[..accidental_len]
        .chars()
        .map(|c| if c == '#' { 1 } else { -1 })
        .sum();

    let octave: i32 = rest[accidental_len..].parse().map_err(|_| invalid())?;
    if !(-1..=9).contains(&octave) {
        return Err(invalid());
    }

    let semitones_from_c4 = (octave - 4) * 12 + semitone + accidental;
    Ok(f64::from(semitones_from_c4) / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- conversion ---

    #[test]
    fn c4_is_zero_volts() {
        assert_eq!(note_volts("C4").unwrap(), 0.0);
    }

    #[test]
    fn octaves_are_one_volt_apart() {
        assert_eq!(note_volts("C5").unwrap(), 1.0);
        assert_eq!(note_volts("C3").unwrap(), -1.0);
        assert_eq!(note_volts("C-1").unwrap(), -5.0);
    }

    #[test]
    fn a4_is_three_quarters() {
        assert_eq!(note_volts("A4").unwrap(), 0.75);
    }

    #[test]
    fn accidentals_move_a_twelfth() {
        assert_eq!(note_volts("C#4").unwrap(), 1.0 / 12.0);
        assert_eq!(note_volts("Db4").unwrap(), 1.0 / 12.0);
        assert_eq!(note_volts("Bb3").unwrap(), -1.0 + 10.0 / 12.0);
    }

    #[test]
    fn double_accidentals_stack() {
        assert_eq!(note_volts("C##4").unwrap(), 2.0 / 12.0);
        assert_eq!(note_volts("Ebb4").unwrap(), 2.0 / 12.0);
    }

    #[test]
    fn lowercase_letters_accepted() {
        assert_eq!(note_volts("a4").unwrap(), note_volts("A4").unwrap());
    }

    // --- rejection ---

    #[test]
    fn rejects_malformed_names() {
        for bad in ["", "H4", "C", "C4x", "4", "C10", "C-2", "#4"] {
            assert!(
                matches!(note_volts(bad), Err(DslError::InvalidNoteName { .. })),
                "should reject {bad:?}"
            );
        }
    }
}
