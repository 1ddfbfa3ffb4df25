//! Leaderboard chart rendering.

use crate::error::{LedgerError, Result};
use crate::types::LeaderboardEntry;
use std::fmt::Write;

/// Turns a guild leaderboard into an image buffer.
pub trait ChartRenderer: Send + Sync {
    fn render(&self, guild_id: &str, entries: &[LeaderboardEntry]) -> Result<Vec<u8>>;
}

/// Bar chart of lifetime XP per user, rendered as SVG.
#[derive(Clone, Debug)]
pub struct SvgBarChart {
    pub width: u32,
    pub height: u32,
    /// Bars beyond this many entries are not drawn.
    pub max_bars: usize,
}

impl Default for SvgBarChart {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            max_bars: 5,
        }
    }
}

const MARGIN: u32 = 40;
const TITLE_HEIGHT: u32 = 30;
const BAR_COLOR: &str = "#5865f2";

impl ChartRenderer for SvgBarChart {
    fn render(&self, guild_id: &str, entries: &[LeaderboardEntry]) -> Result<Vec<u8>> {
        if self.width <= 2 * MARGIN || self.height <= 2 * MARGIN + TITLE_HEIGHT {
            return Err(LedgerError::Render(format!(
                "canvas {}x{} too small",
                self.width, self.height
            )));
        }

        let bars = &entries[..entries.len().min(self.max_bars)];
        let plot_w = self.width - 2 * MARGIN;
        let plot_h = self.height - 2 * MARGIN - TITLE_HEIGHT;
        let plot_top = MARGIN + TITLE_HEIGHT;
        let baseline = plot_top + plot_h;
        let peak = bars.iter().map(|e| e.xp_over_time).max().unwrap_or(0).max(1);

        let mut svg = String::new();
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height
        );
        let _ = write!(
            svg,
            r#"<rect width="100%" height="100%" fill="white"/><text x="{}" y="{}" text-anchor="middle" font-family="sans-serif" font-size="16">XP leaderboard for {}</text>"#,
            self.width / 2,
            MARGIN,
            escape_xml(guild_id)
        );
        let _ = write!(
            svg,
            r#"<line x1="{m}" y1="{b}" x2="{x2}" y2="{b}" stroke="black"/>"#,
            m = MARGIN,
            b = baseline,
            x2 = MARGIN + plot_w
        );

        if !bars.is_empty() {
            let slot = (plot_w / bars.len() as u32).max(1);
            let bar_w = (slot * 3 / 4).max(1);
            for (i, entry) in bars.iter().enumerate() {
                let bar_h = (entry.xp_over_time as f64 / peak as f64 * plot_h as f64).round() as u32;
                let x = MARGIN + slot * i as u32 + (slot - bar_w) / 2;
                let y = baseline - bar_h;
                let label_x = x + bar_w / 2;
                let _ = write!(
                    svg,
                    r#"<rect x="{x}" y="{y}" width="{bar_w}" height="{bar_h}" fill="{BAR_COLOR}"/>"#
                );
                let _ = write!(
                    svg,
                    r#"<text x="{label_x}" y="{}" text-anchor="middle" font-family="sans-serif" font-size="12">{}</text>"#,
                    y.saturating_sub(4).max(plot_top),
                    entry.xp_over_time
                );
                let _ = write!(
                    svg,
                    r#"<text x="{label_x}" y="{}" text-anchor="middle" font-family="sans-serif" font-size="12">{}</text>"#,
                    baseline + 16,
                    escape_xml(&entry.user_id)
                );
            }
        }

        svg.push_str("</svg>");
        Ok(svg.into_bytes())
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(user: &str, xp_over_time: u64) -> LeaderboardEntry {
        LeaderboardEntry {
            xp_over_time,
            user_id: user.into(),
            level: 1,
            xp: 0,
        }
    }

    fn render(chart: &SvgBarChart, entries: &[LeaderboardEntry]) -> String {
        String::from_utf8(chart.render("g1", entries).unwrap()).unwrap()
    }

    #[test]
    fn test_renders_one_bar_per_entry() {
        let svg = render(
            &SvgBarChart::default(),
            &[entry("alice", 30), entry("bob", 10)],
        );
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert_eq!(svg.matches(BAR_COLOR).count(), 2);
        assert!(svg.contains(">alice<"));
        assert!(svg.contains(">30<"));
    }

    #[test]
    fn test_caps_bar_count() {
        let entries: Vec<_> = (0..8).map(|i| entry(&format!("u{}", i), 100 - i)).collect();
        let svg = render(&SvgBarChart::default(), &entries);
        assert_eq!(svg.matches(BAR_COLOR).count(), 5);
    }

    #[test]
    fn test_empty_leaderboard() {
        let svg = render(&SvgBarChart::default(), &[]);
        assert_eq!(svg.matches(BAR_COLOR).count(), 0);
        assert!(svg.contains("XP leaderboard for g1"));
    }

    #[test]
    fn test_escapes_user_ids() {
        let svg = render(&SvgBarChart::default(), &[entry("<b>&", 1)]);
        assert!(svg.contains("&lt;b&gt;&amp;"));
        assert!(!svg.contains("<b>&"));
    }

    #[test]
    fn test_tiny_canvas_rejected() {
        let chart = SvgBarChart {
            width: 10,
            height: 10,
            max_bars: 5,
        };
        assert!(matches!(
            chart.render("g1", &[]),
            Err(LedgerError::Render(_))
        ));
    }
}
