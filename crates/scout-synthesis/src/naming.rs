//! Test names derived from page URLs
//!
//! Names are `test_<host>_<path>` slugs, valid as Python identifiers. A name
//! already taken gets `_v2`, `_v3`, ... appended.

use std::collections::BTreeSet;
use url::Url;

const MAX_SLUG_CHARS: usize = 80;

/// Page identity used for grouping: the URL without its fragment
pub fn page_key(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => raw.split('#').next().unwrap_or(raw).to_string(),
    }
}

fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_underscore = true;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_underscore = false;
        } else if !last_underscore {
            out.push('_');
            last_underscore = true;
        }
    }
    out.trim_end_matches('_').to_string()
}

/// Base test name for a page URL
pub fn test_name_for_url(raw: &str) -> String {
    let (host, path) = match Url::parse(raw) {
        Ok(url) => (
            url.host_str().unwrap_or("local").trim_start_matches("www.").to_string(),
            url.path().to_string(),
        ),
        Err(_) => (String::new(), raw.to_string()),
    };

    let host = slugify(&host);
    let path = match slugify(&path) {
        p if p.is_empty() => "home".to_string(),
        p => p,
    };

    let mut name = if host.is_empty() {
        format!("test_{}", path)
    } else {
        format!("test_{}_{}", host, path)
    };
    if name.len() > MAX_SLUG_CHARS {
        name.truncate(MAX_SLUG_CHARS);
        name = name.trim_end_matches('_').to_string();
    }
    name
}

/// Pick the first free name among `base`, `base_v2`, `base_v3`, ... and claim it
pub fn claim_name(base: &str, taken: &mut BTreeSet<String>) -> String {
    if taken.insert(base.to_string()) {
        return base.to_string();
    }
    let mut version = 2;
    loop {
        let candidate = format!("{}_v{}", base, version);
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_from_urls() {
        assert_eq!(
            test_name_for_url("https://www.shop.example.com/"),
            "test_shop_example_com_home"
        );
        assert_eq!(
            test_name_for_url("https://shop.example.com/products/42?sort=asc#reviews"),
            "test_shop_example_com_products_42"
        );
        assert_eq!(
            test_name_for_url("http://localhost:8000/Sign-In/"),
            "test_localhost_sign_in"
        );
        assert!(test_name_for_url(&format!("https://a.com/{}", "x/".repeat(100))).len() <= 80);
    }

    #[test]
    fn test_page_key_strips_fragment() {
        assert_eq!(
            page_key("https://example.com/docs#install"),
            "https://example.com/docs"
        );
        assert_eq!(page_key("not a url#frag"), "not a url");
    }

    #[test]
    fn test_claim_name_versions() {
        let mut taken: BTreeSet<String> = ["test_a_home".to_string(), "test_a_home_v2".to_string()]
            .into_iter()
            .collect();
        assert_eq!(claim_name("test_a_home", &mut taken), "test_a_home_v3");
        assert_eq!(claim_name("test_a_about", &mut taken), "test_a_about");
        assert_eq!(claim_name("test_a_about", &mut taken), "test_a_about_v2");
    }
}
