use common::{Alignment, Regime};

/// Agreement check across a stack of trend frames plus one entry frame.
///
/// All trend frames share regime R: `FullAlignment(R)` when the entry frame
/// is also R, otherwise `AwaitingBreakout(R)`. Anything else, including a
/// missing frame or an empty stack, is `Mixed`.
pub fn alignment(trend: &[Option<Regime>], entry: Option<Regime>) -> Alignment {
    let Some(&Some(first)) = trend.first() else {
        return Alignment::Mixed;
    };
    if !trend.iter().all(|r| *r == Some(first)) {
        return Alignment::Mixed;
    }
    match entry {
        Some(r) if r == first => Alignment::FullAlignment(first),
        Some(_) => Alignment::AwaitingBreakout(first),
        None => Alignment::Mixed,
    }
}
