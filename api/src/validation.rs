use anyhow::{bail, Result};
use chrono::Datelike;
use regex::Regex;
use std::sync::OnceLock;

static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
static URL_REGEX: OnceLock<Regex> = OnceLock::new();
static DOI_REGEX: OnceLock<Regex> = OnceLock::new();
static COLOR_REGEX: OnceLock<Regex> = OnceLock::new();

/// Earliest publication year accepted for a paper
pub const MIN_PUBLICATION_YEAR: i64 = 1800;

const VENUE_TYPES: &[&str] = &["journal", "conference"];

fn email_regex() -> &'static Regex {
    EMAIL_REGEX
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap())
}

fn url_regex() -> &'static Regex {
    URL_REGEX.get_or_init(|| Regex::new(r"^https?://[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}(/.*)?$").unwrap())
}

fn doi_regex() -> &'static Regex {
    DOI_REGEX.get_or_init(|| Regex::new(r"^10\.\d{4,9}/\S+$").unwrap())
}

fn color_regex() -> &'static Regex {
    COLOR_REGEX.get_or_init(|| Regex::new(r"^#[0-9a-fA-F]{6}$").unwrap())
}

pub fn validate_email(email: &str) -> Result<()> {
    if email.trim().is_empty() {
        bail!("Email cannot be empty");
    }
    if email.len() > 255 {
        bail!("Email is too long (max 255 characters)");
    }
    if !email_regex().is_match(email) {
        bail!("Invalid email format");
    }
    Ok(())
}

pub fn validate_url(url: &str) -> Result<()> {
    if url.trim().is_empty() {
        bail!("URL cannot be empty");
    }
    if url.len() > 2048 {
        bail!("URL is too long (max 2048 characters)");
    }
    if !url_regex().is_match(url) {
        bail!("Invalid URL format (must start with http:// or https://)");
    }
    Ok(())
}

pub fn validate_doi(doi: &str) -> Result<()> {
    if doi.len() > 255 {
        bail!("DOI is too long (max 255 characters)");
    }
    if !doi_regex().is_match(doi) {
        bail!("Invalid DOI format (expected 10.<registrant>/<suffix>)");
    }
    Ok(())
}

/// Validate a required display name (paper title, author, venue or tag name)
/// Returns the trimmed name
pub fn validate_name(kind: &str, name: &str, max_len: usize) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        bail!("{} cannot be empty", kind);
    }
    if trimmed.chars().count() > max_len {
        bail!("{} is too long (max {} characters)", kind, max_len);
    }
    Ok(trimmed.to_string())
}

/// Publication years run from 1800 up to next year (papers accepted ahead of print)
pub fn validate_publication_year(year: i64) -> Result<()> {
    let max_year = i64::from(chrono::Utc::now().year()) + 1;
    if !(MIN_PUBLICATION_YEAR..=max_year).contains(&year) {
        bail!(
            "Publication year must be between {} and {}",
            MIN_PUBLICATION_YEAR,
            max_year
        );
    }
    Ok(())
}

pub fn validate_citation_count(count: i64) -> Result<()> {
    if count < 0 {
        bail!("Citation count cannot be negative");
    }
    Ok(())
}

pub fn validate_tag_color(color: &str) -> Result<()> {
    if !color_regex().is_match(color) {
        bail!("Invalid tag color (expected #RRGGBB)");
    }
    Ok(())
}

pub fn validate_venue_type(venue_type: &str) -> Result<()> {
    if !VENUE_TYPES.contains(&venue_type) {
        bail!(
            "Invalid venue type. Must be one of: {}",
            VENUE_TYPES.join(", ")
        );
    }
    Ok(())
}
