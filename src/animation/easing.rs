//! イージング曲線。進捗は `0..=1` に収める

/// `1 - (1 - p)^4`: 速く始まり、ゆっくり着地する。カウンターで使う
pub fn ease_out_quart(progress: f64) -> f64 {
    let p = progress.clamp(0.0, 1.0);
    1.0 - (1.0 - p).powi(4)
}

/// `(t, b, c, d)` 形式（経過時間、開始値、変化量、長さ）の2次 ease-in-out。
/// `elapsed` が `duration` を超えると `start + change` ちょうどになる。
pub fn ease_in_out_quad(elapsed: f64, start: f64, change: f64, duration: f64) -> f64 {
    if duration <= 0.0 {
        return start + change;
    }
    let mut t = elapsed.clamp(0.0, duration) / (duration / 2.0);
    if t < 1.0 {
        return change / 2.0 * t * t + start;
    }
    t -= 1.0;
    -change / 2.0 * (t * (t - 2.0) - 1.0) + start
}
