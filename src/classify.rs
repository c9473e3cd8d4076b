/// Local vs. external link target classification.
use std::sync::LazyLock;

use regex::Regex;

use crate::types::LinkRecord;

/// Contact schemes (`callto:`, `mailto:`, `tel:`) at the start, or any `scheme://`.
#[allow(clippy::expect_used, reason = "pattern is a compile-time constant")]
static NON_LOCAL: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r"^(?:callto|mailto|tel):|://").expect("valid non-local pattern");
});

/// Whether a raw link target points inside the repository.
pub fn is_local(target: &str) -> bool {
    return !NON_LOCAL.is_match(target);
}

/// Drop external targets, keeping local ones in document order.
pub fn retain_local(mut links: Vec<LinkRecord>) -> Vec<LinkRecord> {
    links.retain(|link| return is_local(&link.target));
    return links;
}
