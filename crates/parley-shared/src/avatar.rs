use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Background palette for generated avatars.
const PALETTE: [&str; 8] = [
    "#e57373", "#f06292", "#ba68c8", "#7986cb", "#4fc3f7", "#4db6ac", "#aed581", "#ffb74d",
];

/// Up to two uppercase initials taken from the words of `name`.
pub fn initials(name: &str) -> String {
    let initials: String = name
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .take(2)
        .flat_map(char::to_uppercase)
        .collect();

    if initials.is_empty() {
        "?".to_string()
    } else {
        initials
    }
}

/// Default avatar derived from a display name: an SVG data URI with the
/// initials on a colour picked from a BLAKE3 hash of the name.
pub fn default_avatar(name: &str) -> String {
    let hash = blake3::hash(name.trim().to_lowercase().as_bytes());
    let color = PALETTE[hash.as_bytes()[0] as usize % PALETTE.len()];

    let svg = format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="128" height="128"><rect width="128" height="128" rx="64" fill="{color}"/><text x="50%" y="50%" dy=".35em" text-anchor="middle" font-family="sans-serif" font-size="52" fill="#ffffff">{}</text></svg>"##,
        escape_xml(&initials(name))
    );

    format!("data:image/svg+xml;base64,{}", STANDARD.encode(svg))
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
