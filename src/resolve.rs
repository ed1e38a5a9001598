use strsim::jaro_winkler;

use crate::stats_api::PlayerListing;

/// Similarity floor (0-100 scale) below which a match is flagged.
pub const ACCEPT_SCORE: f64 = 80.0;

#[derive(Debug, Clone)]
pub struct ResolvedPlayer {
    pub id: i64,
    pub name: String,
    pub score: f64,
    /// Best match scored under [`ACCEPT_SCORE`]. The resolver still
    /// substitutes it -- callers are expected to warn. Preserved from the
    /// original product behavior; see DESIGN.md.
    pub low_confidence: bool,
}

/// Fuzzy-match a free-text name against the canonical player list. Returns
/// the best candidate, or `None` when the list is empty.
pub fn resolve_player(query: &str, players: &[PlayerListing]) -> Option<ResolvedPlayer> {
    let needle = fold_name(query);
    if needle.is_empty() {
        return None;
    }

    let mut best: Option<(&PlayerListing, f64)> = None;
    for candidate in players {
        let folded = fold_name(&candidate.full_name);
        let score = if folded == needle {
            100.0
        } else {
            jaro_winkler(&needle, &folded) * 100.0
        };
        if best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((candidate, score));
        }
        if score >= 100.0 {
            break;
        }
    }

    best.map(|(candidate, score)| ResolvedPlayer {
        id: candidate.id,
        name: candidate.full_name.clone(),
        score,
        low_confidence: score < ACCEPT_SCORE,
    })
}

/// Lowercase and fold accented Latin characters to ASCII so "Dončić" and
/// "Doncic" compare equal. Unmapped non-ASCII characters pass through.
pub fn fold_name(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.trim().chars() {
        match fold_char(ch) {
            Folded::One(c) => out.push(c),
            Folded::Two(a, b) => {
                out.push(a);
                out.push(b);
            }
        }
    }
    out
}

enum Folded {
    One(char),
    Two(char, char),
}

fn fold_char(ch: char) -> Folded {
    let lower = ch.to_ascii_lowercase();
    if lower.is_ascii() {
        return Folded::One(lower);
    }
    let folded = match ch {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' | 'ā' | 'ă' | 'ą' | 'Á' | 'À' | 'Â' | 'Ä' | 'Ã'
        | 'Å' | 'Ā' | 'Ă' | 'Ą' => 'a',
        'ç' | 'ć' | 'č' | 'Ç' | 'Ć' | 'Č' => 'c',
        'ď' | 'đ' | 'Ď' | 'Đ' => 'd',
        'é' | 'è' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' | 'É' | 'È' | 'Ê' | 'Ë' | 'Ē' | 'Ė'
        | 'Ę' | 'Ě' => 'e',
        'ğ' | 'ģ' | 'Ğ' | 'Ģ' => 'g',
        'í' | 'ì' | 'î' | 'ï' | 'ī' | 'į' | 'Í' | 'Ì' | 'Î' | 'Ï' | 'Ī' | 'Į' => 'i',
        'ķ' | 'Ķ' => 'k',
        'ļ' | 'ł' | 'ľ' | 'Ļ' | 'Ł' | 'Ľ' => 'l',
        'ñ' | 'ń' | 'ņ' | 'ň' | 'Ñ' | 'Ń' | 'Ņ' | 'Ň' => 'n',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'ø' | 'ō' | 'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' | 'Ø' | 'Ō' => 'o',
        'ŕ' | 'ř' | 'Ŕ' | 'Ř' => 'r',
        'ś' | 'ş' | 'š' | 'ș' | 'Ś' | 'Ş' | 'Š' | 'Ș' => 's',
        'ť' | 'ţ' | 'ț' | 'Ť' | 'Ţ' | 'Ț' => 't',
        'ú' | 'ù' | 'û' | 'ü' | 'ū' | 'ů' | 'ų' | 'Ú' | 'Ù' | 'Û' | 'Ü' | 'Ū' | 'Ů' | 'Ų' => 'u',
        'ý' | 'ÿ' | 'Ý' | 'Ÿ' => 'y',
        'ź' | 'ż' | 'ž' | 'Ź' | 'Ż' | 'Ž' => 'z',
        'æ' | 'Æ' => return Folded::Two('a', 'e'),
        'œ' | 'Œ' => return Folded::Two('o', 'e'),
        'ß' => return Folded::Two('s', 's'),
        'þ' | 'Þ' => return Folded::Two('t', 'h'),
        other => other,
    };
    Folded::One(folded.to_ascii_lowercase())
}
