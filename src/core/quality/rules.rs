//! Geometry gate applied before any restoration.
//!
//! Depends only on width and height; an image with a perfect quality score
//! can still fail here.

/// True when the shorter side reaches `min_side` and `width / height` lies
/// within `[aspect_min, aspect_max]`.
pub fn passes_basic_rules(
    width: u32,
    height: u32,
    min_side: u32,
    aspect_min: f64,
    aspect_max: f64,
) -> bool {
    geometry_failure(width, height, min_side, aspect_min, aspect_max).is_none()
}

/// Human-readable reason the geometry gate fails, if it does
pub fn geometry_failure(
    width: u32,
    height: u32,
    min_side: u32,
    aspect_min: f64,
    aspect_max: f64,
) -> Option<String> {
    let short = width.min(height);
    if short < min_side {
        return Some(format!("short side {} < {}", short, min_side));
    }

    let aspect = if height == 0 {
        0.0
    } else {
        width as f64 / height as f64
    };
    if aspect < aspect_min || aspect > aspect_max {
        return Some(format!(
            "aspect {:.2} outside [{:.2}, {:.2}]",
            aspect, aspect_min, aspect_max
        ));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_square_fails_on_short_side() {
        assert!(!passes_basic_rules(800, 800, 1024, 0.5, 2.0));
        let reason = geometry_failure(800, 800, 1024, 0.5, 2.0).unwrap();
        assert!(reason.contains("800"));
    }

    #[test]
    fn large_square_passes() {
        assert!(passes_basic_rules(1024, 1024, 1024, 0.5, 2.0));
    }

    #[test]
    fn extreme_aspect_fails_even_when_large() {
        // 2048 / 1023 is just over 2.0
        assert!(!passes_basic_rules(2048, 1023, 1000, 0.5, 2.0));
        assert!(!passes_basic_rules(1023, 2048, 1000, 0.5, 2.0));
        let reason = geometry_failure(4000, 1100, 1024, 0.5, 2.0).unwrap();
        assert!(reason.starts_with("aspect"));
    }

    #[test]
    fn aspect_bounds_are_inclusive() {
        assert!(passes_basic_rules(2048, 1024, 1024, 0.5, 2.0));
        assert!(passes_basic_rules(1024, 2048, 1024, 0.5, 2.0));
    }

    #[test]
    fn same_inputs_same_verdict() {
        let first = passes_basic_rules(1500, 1100, 1024, 0.5, 2.0);
        for _ in 0..10 {
            assert_eq!(passes_basic_rules(1500, 1100, 1024, 0.5, 2.0), first);
        }
    }

    #[test]
    fn zero_height_fails() {
        assert!(!passes_basic_rules(2000, 0, 0, 0.5, 2.0));
    }
}
