use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use statrs::statistics::Statistics;

/// a macro to declare simple Vec<String>
#[macro_export]
macro_rules! string_vec {
    ($($x:expr),*) => {
        vec![$($x.into()),*]
    };
}

/// info! that keeps ANSI colors only when the run is displayed in color
#[macro_export]
macro_rules! cinfo {
    ($colorful:expr, $($arg:tt)+) => {
        if $colorful {
            log::info!($($arg)+);
        } else {
            log::info!("{}", $crate::utils::strip_ansi(&format!($($arg)+)));
        }
    };
}

/// Remove ANSI escape sequences (`ESC [ ... letter`) from a string
pub fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            while let Some(&n) = chars.peek() {
                chars.next();
                if n.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// a function used essentially in CV that split randomly a Vec<T> into p Vec<T> of approximatively the same size
pub fn split_into_balanced_random_chunks<T: Clone>(vec: Vec<T>, p: usize, rng: &mut ChaCha8Rng) -> Vec<Vec<T>> {
    let mut shuffled = vec;
    shuffled.shuffle(rng);

    let n = shuffled.len();
    let base_size = n / p;
    let extra_elements = n % p;

    // the first `extra_elements` chunks receive one more element
    let mut chunks = Vec::with_capacity(p);
    let mut start = 0;
    for i in 0..p {
        let chunk_size = base_size + if i < extra_elements { 1 } else { 0 };
        let end = start + chunk_size;
        chunks.push(shuffled[start..end].to_vec());
        start = end;
    }

    chunks
}

/// Mean and sample standard deviation (0.0 when fewer than two values)
pub fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, 0.0);
    }
    let mean = values.iter().mean();
    let std = if values.len() < 2 { 0.0 } else { values.iter().std_dev() };
    (mean, std)
}

/// Trailing moving average over a window, one value per complete window
/// (same length convention as a 'valid' convolution)
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || values.len() < window {
        return Vec::new();
    }
    values
        .windows(window)
        .map(|w| w.iter().sum::<f64>() / window as f64)
        .collect()
}

/// Render a sequence as a one-line unicode sparkline (non finite values as a blank)
pub fn sparkline(values: &[f64]) -> String {
    const TICKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return " ".repeat(values.len());
    }
    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;

    values
        .iter()
        .map(|v| {
            if !v.is_finite() {
                ' '
            } else if span <= 0.0 {
                TICKS[TICKS.len() / 2]
            } else {
                let idx = ((v - min) / span * (TICKS.len() - 1) as f64).round() as usize;
                TICKS[idx.min(TICKS.len() - 1)]
            }
        })
        .collect()
}

/// Serde helpers for floats that may be non finite (an all-empty population
/// scores `-inf`). serde_json writes those as `null` and cannot read them back,
/// so human readable formats store them as the strings "inf", "-inf" and "NaN".
/// Binary formats keep the raw float.
///
/// Use with `#[serde(with = "crate::utils::float_format")]` on `f64` fields and
/// `#[serde(with = "crate::utils::float_format::vec")]` on `Vec<f64>` fields.
pub mod float_format {
    use serde::de::{self, Unexpected, Visitor};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::fmt;

    struct Float(f64);

    impl Serialize for Float {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            if serializer.is_human_readable() && !self.0.is_finite() {
                serializer.serialize_str(&self.0.to_string())
            } else {
                serializer.serialize_f64(self.0)
            }
        }
    }

    impl<'de> Deserialize<'de> for Float {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Float, D::Error> {
            if deserializer.is_human_readable() {
                deserializer.deserialize_any(FloatVisitor)
            } else {
                deserializer.deserialize_f64(FloatVisitor)
            }
        }
    }

    struct FloatVisitor;

    impl<'de> Visitor<'de> for FloatVisitor {
        type Value = Float;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a number or one of \"inf\", \"-inf\", \"NaN\"")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Float, E> {
            Ok(Float(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Float, E> {
            Ok(Float(v as f64))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Float, E> {
            Ok(Float(v as f64))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Float, E> {
            v.parse::<f64>().map(Float).map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
        }
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        Float(*value).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Float::deserialize(deserializer).map(|f| f.0)
    }

    pub mod vec {
        use super::Float;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_seq(values.iter().map(|v| Float(*v)))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
            Vec::<Float>::deserialize(deserializer).map(|values| values.into_iter().map(|f| f.0).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_split_into_balanced_random_chunks_sizes() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let chunks = split_into_balanced_random_chunks((0..11).collect::<Vec<usize>>(), 3, &mut rng);
        let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![4, 4, 3]);

        let mut all: Vec<usize> = chunks.into_iter().flatten().collect();
        all.sort();
        assert_eq!(all, (0..11).collect::<Vec<usize>>(), "every element must land in exactly one chunk");
    }

    #[test]
    fn test_split_into_balanced_random_chunks_reproducible() {
        let a = split_into_balanced_random_chunks((0..20).collect::<Vec<usize>>(), 4, &mut ChaCha8Rng::seed_from_u64(7));
        let b = split_into_balanced_random_chunks((0..20).collect::<Vec<usize>>(), 4, &mut ChaCha8Rng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_mean_and_std() {
        let (mean, std) = mean_and_std(&[1.0, 2.0, 3.0, 4.0]);
        assert!((mean - 2.5).abs() < 1e-12);
        assert!((std - 1.2909944487358056).abs() < 1e-9);

        let (mean, std) = mean_and_std(&[0.7]);
        assert_eq!(mean, 0.7);
        assert_eq!(std, 0.0);
    }

    #[test]
    fn test_moving_average_valid_windows() {
        let avg = moving_average(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(avg, vec![2.0, 3.0, 4.0]);
        assert!(moving_average(&[1.0, 2.0], 3).is_empty());
        assert_eq!(moving_average(&[1.0, 2.0], 1), vec![1.0, 2.0]);
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[1;93mFold #1\x1b[0m done"), "Fold #1 done");
        assert_eq!(strip_ansi("plain"), "plain");
    }

    #[test]
    fn test_sparkline_shape() {
        let line = sparkline(&[0.0, 0.5, 1.0, f64::NEG_INFINITY]);
        let chars: Vec<char> = line.chars().collect();
        assert_eq!(chars.len(), 4);
        assert_eq!(chars[0], '▁');
        assert_eq!(chars[2], '█');
        assert_eq!(chars[3], ' ');
    }

    #[derive(serde::Serialize, serde::Deserialize, Debug)]
    struct Scores {
        #[serde(with = "float_format")]
        best: f64,
        #[serde(with = "float_format::vec")]
        series: Vec<f64>,
    }

    #[test]
    fn test_float_format_keeps_non_finite_values_in_json() {
        let scores = Scores { best: f64::NEG_INFINITY, series: vec![f64::NEG_INFINITY, 0.5, f64::INFINITY, f64::NAN] };
        let json = serde_json::to_string(&scores).unwrap();
        assert_eq!(json, r#"{"best":"-inf","series":["-inf",0.5,"inf","NaN"]}"#);

        let back: Scores = serde_json::from_str(&json).unwrap();
        assert_eq!(back.best, f64::NEG_INFINITY);
        assert_eq!(&back.series[..3], &[f64::NEG_INFINITY, 0.5, f64::INFINITY]);
        assert!(back.series[3].is_nan());

        let plain: Scores = serde_json::from_str(r#"{"best":2,"series":[1,-3,0.25]}"#).unwrap();
        assert_eq!(plain.best, 2.0);
        assert_eq!(plain.series, vec![1.0, -3.0, 0.25]);
        assert!(serde_json::from_str::<Scores>(r#"{"best":"high","series":[]}"#).is_err());
    }

    #[test]
    fn test_float_format_is_raw_in_bincode() {
        let scores = Scores { best: f64::NEG_INFINITY, series: vec![f64::INFINITY, 1.5] };
        let bytes = bincode::serialize(&scores).unwrap();
        // u64 length prefix plus three raw f64
        assert_eq!(bytes.len(), 8 + 3 * 8);
        let back: Scores = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back.best, f64::NEG_INFINITY);
        assert_eq!(back.series, vec![f64::INFINITY, 1.5]);
    }
}
