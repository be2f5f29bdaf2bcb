use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use unicode_width::UnicodeWidthChar;

pub fn download_bar(total: u64, name: &str) -> ProgressBar {
  let bar = if total > 0 {
    ProgressBar::new(total)
  } else {
    ProgressBar::new_spinner()
  };
  bar.set_style(
    ProgressStyle::with_template(
      "{msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=> "),
  );
  bar.set_message(format!("Downloading {name}"));
  bar
}

pub fn extract_bar(total: u64) -> ProgressBar {
  let bar = ProgressBar::new(total);
  bar.set_style(
    ProgressStyle::with_template("{msg} [{bar:30.cyan/blue}] {pos}/{len}")
      .unwrap_or_else(|_| ProgressStyle::default_bar())
      .progress_chars("=> "),
  );
  bar.set_message("Extracting files");
  bar
}

/// Terminal cell width of a string. Variation selectors and zero-width
/// joiners occupy no cells even though `unicode-width` counts some of them.
pub fn visible_width(text: &str) -> usize {
  text
    .chars()
    .filter(|ch| !matches!(*ch as u32, 0xFE00..=0xFE0F | 0x200D))
    .map(|ch| ch.width().unwrap_or(0))
    .sum()
}

/// Prints a box-drawing framed warning. Width accounting uses
/// [`visible_width`] so emoji and double-wide glyphs keep the frame aligned.
pub fn print_warning_box(title: &str, lines: &[String]) {
  let padding = 2;
  let mut content: Vec<String> = vec![title.to_string(), String::new()];
  content.extend(lines.iter().cloned());

  let max_width = content.iter().map(|line| visible_width(line)).max().unwrap_or(0);
  let inner_width = max_width + padding * 2;

  println!();
  println!("╔{}╗", "═".repeat(inner_width));
  for line in &content {
    let fill = max_width - visible_width(line);
    println!(
      "║{pad}{line}{fill}{pad}║",
      pad = " ".repeat(padding),
      fill = " ".repeat(fill)
    );
  }
  println!("╚{}╝", "═".repeat(inner_width));
}

/// Prompts on stdout and accepts `y`/`yes` (case-insensitive) from stdin.
pub fn confirm(prompt: &str) -> bool {
  print!("{prompt}");
  let _ = io::stdout().flush();
  let mut answer = String::new();
  if io::stdin().lock().read_line(&mut answer).is_err() {
    return false;
  }
  matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
