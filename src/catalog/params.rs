//! Door parameters stored in `_K3` companion files.

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParameterSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thickness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fold_above: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fold_left: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fold_right: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Length,
    Width,
    Thickness,
    FoldAbove,
    FoldLeft,
    FoldRight,
}

// Checked in order; the first key found on a line wins.
// NOTE: FOLD_LEFT fills fold_right and FOLD_RIGHT fills fold_left. Clients
// rely on this mapping, keep it as is.
const KEYS: [(&str, Field); 6] = [
    ("RFID_APP_DOORLENGTH[0]=", Field::Length),
    ("RFID_APP_DOORWIDTH[0]=", Field::Width),
    ("RFID_APP_DOORTHICKNESS[0]=", Field::Thickness),
    ("RFID_APP_FOLD_ABOVE[0]=", Field::FoldAbove),
    ("RFID_APP_FOLD_LEFT[0]=", Field::FoldRight),
    ("RFID_APP_FOLD_RIGHT[0]=", Field::FoldLeft),
];

impl ParameterSet {
    fn slot(&mut self, field: Field) -> &mut Option<f64> {
        match field {
            Field::Length => &mut self.length,
            Field::Width => &mut self.width,
            Field::Thickness => &mut self.thickness,
            Field::FoldAbove => &mut self.fold_above,
            Field::FoldLeft => &mut self.fold_left,
            Field::FoldRight => &mut self.fold_right,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Parses recognized keys from companion file text.
///
/// Returns `None` when no recognized key carried a usable number.
pub fn parse_parameters(text: &str) -> Option<ParameterSet> {
    let mut params = ParameterSet::default();
    for line in text.lines().map(str::trim) {
        let Some(&(_, field)) = KEYS.iter().find(|(key, _)| line.contains(key)) else {
            continue;
        };
        // value sits between the first and second '=' of the line
        let Some(raw) = line.split('=').nth(1) else { continue };
        match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => *params.slot(field) = Some(v),
            _ => {}
        }
    }
    (!params.is_empty()).then_some(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn door_length_only() {
        let p = parse_parameters("RFID_APP_DOORLENGTH[0]=1200.5\n").unwrap();
        assert_eq!(p, ParameterSet { length: Some(1200.5), ..Default::default() });
    }

    #[test]
    fn no_recognized_keys_is_absent() {
        assert_eq!(parse_parameters(""), None);
        assert_eq!(parse_parameters("G0 X0 Y0\nM30\nRFID_APP_OTHER[0]=4"), None);
    }

    #[test]
    fn fold_sides_are_cross_mapped() {
        let p = parse_parameters("RFID_APP_FOLD_LEFT[0]=10\nRFID_APP_FOLD_RIGHT[0]=20\n").unwrap();
        assert_eq!(p.fold_right, Some(10.0));
        assert_eq!(p.fold_left, Some(20.0));
    }

    #[test]
    fn all_keys_with_noise() {
        let text = "; K3 parameters\r\n\
            RFID_APP_DOORLENGTH[0]=2015\r\n\
            RFID_APP_DOORWIDTH[0]= 930.0 \r\n\
            RFID_APP_DOORTHICKNESS[0]=40\r\n\
            N10 RFID_APP_FOLD_ABOVE[0]=12.5\r\n\
            RFID_APP_FOLD_LEFT[0]=3\r\n\
            RFID_APP_FOLD_RIGHT[0]=4\r\n\
            M30\r\n";
        let p = parse_parameters(text).unwrap();
        assert_eq!(p.length, Some(2015.0));
        assert_eq!(p.width, Some(930.0));
        assert_eq!(p.thickness, Some(40.0));
        assert_eq!(p.fold_above, Some(12.5));
        assert_eq!(p.fold_right, Some(3.0));
        assert_eq!(p.fold_left, Some(4.0));
    }

    #[test]
    fn unparseable_value_is_skipped() {
        let text = "RFID_APP_DOORLENGTH[0]=abc\nRFID_APP_DOORWIDTH[0]=800\nRFID_APP_DOORTHICKNESS[0]=\nRFID_APP_FOLD_ABOVE[0]=nan";
        let p = parse_parameters(text).unwrap();
        assert_eq!(p, ParameterSet { width: Some(800.0), ..Default::default() });
    }

    #[test]
    fn absent_fields_are_not_serialized() {
        let p = parse_parameters("RFID_APP_DOORWIDTH[0]=800").unwrap();
        assert_eq!(serde_json::to_value(&p).unwrap(), serde_json::json!({"width": 800.0}));
    }
}
