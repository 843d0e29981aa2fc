//! 装飾要素の時間差つき浮遊アニメーション

use std::rc::Rc;

use crate::ui::element::Element;

/// `0..1` の黄金比数列。ランダムな揺らぎの決定的な代わり
pub fn golden_jitter(index: usize) -> f64 {
    const PHI_FRACTION: f64 = 0.618_033_988_749_895;
    ((index as f64 + 1.0) * PHI_FRACTION).fract()
}

/// `index` 番目の浮遊要素の CSS `animation` 値。長さは 3〜5 秒、
/// 開始は `index * 0.5s` 遅れる。`jitter` は `0..=1` に収める。
pub fn float_animation(index: usize, jitter: f64) -> String {
    let delay = index as f64 * 0.5;
    let duration = 3.0 + jitter.clamp(0.0, 1.0) * 2.0;
    format!("float {:.2}s ease-in-out {}s infinite", duration, delay)
}

pub fn animate_floating<J>(elements: &[Rc<dyn Element>], mut jitter: J)
where
    J: FnMut(usize) -> f64,
{
    for (index, element) in elements.iter().enumerate() {
        element.set_style("animation", &float_animation(index, jitter(index)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::element::MemoryElement;
    use crate::ui::viewport::Rect;

    #[test]
    fn test_float_animation_staggers_delay() {
        assert_eq!(float_animation(0, 0.0), "float 3.00s ease-in-out 0s infinite");
        assert_eq!(float_animation(3, 1.0), "float 5.00s ease-in-out 1.5s infinite");
        assert_eq!(float_animation(1, 7.0), "float 5.00s ease-in-out 0.5s infinite");
    }

    #[test]
    fn test_golden_jitter_stays_in_unit_range() {
        for i in 0..100 {
            let j = golden_jitter(i);
            assert!((0.0..1.0).contains(&j));
        }
        assert_ne!(golden_jitter(0), golden_jitter(1));
    }

    #[test]
    fn test_animate_floating_sets_style_on_each() {
        let a = Rc::new(MemoryElement::new("", Rect::default()));
        let b = Rc::new(MemoryElement::new("", Rect::default()));
        let elements: Vec<Rc<dyn Element>> = vec![a.clone(), b.clone()];
        animate_floating(&elements, |_| 0.5);

        assert_eq!(a.style("animation").as_deref(), Some("float 4.00s ease-in-out 0s infinite"));
        assert_eq!(b.style("animation").as_deref(), Some("float 4.00s ease-in-out 0.5s infinite"));
    }
}
