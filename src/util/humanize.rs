const SIZE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

pub fn format_bytes(bytes: f64) -> String {
  if !bytes.is_finite() || bytes < 1.0 {
    return "Unknown".to_string();
  }

  let exp = (bytes.ln() / 1024f64.ln()).floor() as usize;
  let exp = exp.min(SIZE_UNITS.len() - 1);
  let value = bytes / 1024f64.powi(exp as i32);

  format!("{:.1} {}", value, SIZE_UNITS[exp])
}

pub fn format_duration(secs: u64) -> String {
  let hours = secs / 3600;
  let minutes = (secs % 3600) / 60;
  let seconds = secs % 60;

  if hours > 0 {
    format!("{}:{:02}:{:02}", hours, minutes, seconds)
  } else {
    format!("{}:{:02}", minutes, seconds)
  }
}

pub fn format_views(views: u64) -> String {
  let v = views as f64;
  match views {
    1_000_000_000.. => format!("{:.1}B views", v / 1e9),
    1_000_000.. => format!("{:.1}M views", v / 1e6),
    1_000.. => format!("{:.1}K views", v / 1e3),
    _ => format!("{} views", views),
  }
}
