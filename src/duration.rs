/// Rendered for any duration that cannot be decoded.
pub const NOT_AVAILABLE: &str = "N/A";

/// Raw duration stored on a video whose detail entry was absent or malformed.
/// It never matches the compact notation, so it always renders as [`NOT_AVAILABLE`].
pub const UNKNOWN_DURATION: &str = NOT_AVAILABLE;

/// Render a compact `PT[nH][nM][nS]` duration as e.g. `1h 2m 3s`.
///
/// Zero-valued segments are omitted, so `PT0S` renders as an empty string.
/// Anything outside the notation (days, fractions, stray text) renders as `N/A`.
pub fn parse_duration(raw: &str) -> String {
  let Some([hours, minutes, seconds]) = parse_segments(raw.trim()) else {
    return NOT_AVAILABLE.to_string();
  };

  let mut rendered = String::new();
  for (value, unit) in [(hours, 'h'), (minutes, 'm'), (seconds, 's')] {
    if value > 0 {
      rendered.push_str(&format!("{}{} ", value, unit));
    }
  }
  rendered.trim().to_string()
}

/// Split `PT[nH][nM][nS]` into `[h, m, s]`, defaulting missing segments to zero.
fn parse_segments(raw: &str) -> Option<[u64; 3]> {
  let mut rest = raw.strip_prefix("PT")?;
  let mut segments = [0u64; 3];

  for (idx, unit) in ['H', 'M', 'S'].into_iter().enumerate() {
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0 && rest[digits..].starts_with(unit) {
      segments[idx] = rest[..digits].parse().ok()?;
      rest = &rest[digits + 1..];
    }
  }

  rest.is_empty().then_some(segments)
}
