use regex::Regex;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("`{locator}` does not occur in the page")]
    NotFound { locator: &'static str },

    #[error("`{locator}` occurs in the page but its object literal could not be delimited")]
    MalformedPayload { locator: &'static str },
}

/// How the end of an embedded object literal is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// Shortest `{...}` span that is directly followed by this regex fragment.
    Delimited(&'static str),
    /// Brace-balanced scan that skips over string literals.
    Balanced,
}

/// Finds one `name = {...}` assignment inside a page.
#[derive(Debug)]
pub struct Locator {
    name: &'static str,
    anchor: Regex,
    capture: Option<Regex>,
}

impl Locator {
    /// `anchor` matches the assignment up to (not including) the opening brace.
    pub fn new(name: &'static str, anchor: &str, boundary: Boundary) -> Result<Self, regex::Error> {
        let capture = match boundary {
            Boundary::Delimited(delimiter) => Some(Regex::new(&format!(
                r"(?s)\A(?:{anchor})(\{{.*?\}})(?:{delimiter})"
            ))?),
            Boundary::Balanced => None,
        };

        Ok(Self {
            name,
            anchor: Regex::new(anchor)?,
            capture,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Returns the object literal assigned at the first occurrence of `locator`.
///
/// The coarse anchor is searched across the whole page. The capture then runs
/// on the script region that starts at that occurrence and ends at the next
/// `</script`, or at the end of the page when there is none.
pub fn extract<'a>(page: &'a str, locator: &Locator) -> Result<&'a str, ExtractError> {
    let Some(found) = locator.anchor.find(page) else {
        return Err(ExtractError::NotFound {
            locator: locator.name,
        });
    };

    let region_end = page[found.end()..]
        .find("</script")
        .map(|offset| found.end() + offset)
        .unwrap_or(page.len());
    let region = &page[found.start()..region_end];

    let span = match &locator.capture {
        Some(capture) => capture
            .captures(region)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str()),
        None => balanced_object(&region[found.len()..]),
    };

    span.ok_or(ExtractError::MalformedPayload {
        locator: locator.name,
    })
}

fn balanced_object(text: &str) -> Option<&str> {
    let text = text.trim_start();
    if !text.starts_with('{') {
        return None;
    }

    let mut depth = 0_usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, byte) in text.bytes().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[..=idx]);
                }
            }
            _ => {}
        }
    }

    None
}
