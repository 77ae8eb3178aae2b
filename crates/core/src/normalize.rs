//! Text normalization for the reconstruction font.
//!
//! Output contains printable ASCII only. Known accented Latin letters fold to
//! their base letter, everything else unsupported becomes `?`.

pub const PLACEHOLDER: char = '?';

/// Normalized text plus how many characters fell back to [`PLACEHOLDER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub text: String,
    pub replaced: usize,
}

pub fn normalize(text: &str) -> String {
    normalize_report(text).text
}

pub fn normalize_report(text: &str) -> Normalized {
    let mut out = String::with_capacity(text.len());
    let mut replaced = 0usize;
    for ch in text.chars() {
        if is_printable_ascii(ch) {
            out.push(ch);
        } else if let Some(folded) = fold(ch) {
            out.push_str(folded);
        } else {
            out.push(PLACEHOLDER);
            replaced += 1;
        }
    }
    Normalized {
        text: out,
        replaced,
    }
}

pub fn is_printable_ascii(ch: char) -> bool {
    matches!(ch, ' '..='~')
}

fn fold(ch: char) -> Option<&'static str> {
    let folded = match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => "a",
        'è' | 'é' | 'ê' | 'ë' => "e",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => "o",
        'ù' | 'ú' | 'û' | 'ü' => "u",
        'ý' | 'ÿ' => "y",
        'ñ' => "n",
        'ç' => "c",
        'ß' => "ss",
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => "A",
        'È' | 'É' | 'Ê' | 'Ë' => "E",
        'Ì' | 'Í' | 'Î' | 'Ï' => "I",
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' => "O",
        'Ù' | 'Ú' | 'Û' | 'Ü' => "U",
        'Ý' => "Y",
        'Ñ' => "N",
        'Ç' => "C",
        // Polish letters fold to lowercase in both cases.
        'ą' | 'Ą' => "a",
        'ć' | 'Ć' => "c",
        'ę' | 'Ę' => "e",
        'ł' | 'Ł' => "l",
        'ń' | 'Ń' => "n",
        'ś' | 'Ś' => "s",
        'ź' | 'Ź' | 'ż' | 'Ż' => "z",
        _ => return None,
    };
    Some(folded)
}
