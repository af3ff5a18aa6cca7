//! Run-length accumulator for PostScript pixel packets.

/// Longest run one packet can describe.
pub const MAX_RUN: u16 = 255;

/// Collects identical consecutive values into runs of at most
/// [`MAX_RUN`].
///
/// Completed runs come back as `(value, length - 1)`, the byte the
/// PostScript prolog reads after each packet. Call [`RunLength::flush`] at
/// the end of every row so runs never cross rows.
#[derive(Clone, Debug, Default)]
pub struct RunLength<T> {
    current: Option<T>,
    length: u16,
}

impl<T: Copy + PartialEq> RunLength<T> {
    pub fn new() -> Self {
        Self {
            current: None,
            length: 0,
        }
    }

    /// Add one value. Returns the pending run when `value` cannot extend it.
    pub fn push(&mut self, value: T) -> Option<(T, u8)> {
        match self.current {
            Some(current) if current == value && self.length < MAX_RUN => {
                self.length += 1;
                None
            }
            _ => {
                let done = self.flush();
                self.current = Some(value);
                self.length = 1;
                done
            }
        }
    }

    /// End the pending run.
    pub fn flush(&mut self) -> Option<(T, u8)> {
        let value = self.current.take()?;
        let length = std::mem::take(&mut self.length);
        Some((value, (length - 1) as u8))
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runs<T: Copy + PartialEq>(rows: &[&[T]]) -> Vec<(T, u8)> {
        let mut rle = RunLength::new();
        let mut out = Vec::new();
        for row in rows {
            out.extend(row.iter().filter_map(|&v| rle.push(v)));
            out.extend(rle.flush());
        }
        out
    }

    #[test]
    fn runs_stop_at_255() {
        let row = vec![7u8; 600];
        let out = runs(&[&row]);
        assert_eq!(out, vec![(7, 254), (7, 254), (7, 89)]);
        let total: usize = out.iter().map(|&(_, n)| n as usize + 1).sum();
        assert_eq!(total, 600);
    }

    #[test]
    fn runs_never_cross_rows() {
        let out = runs(&[&[1u8, 1, 1], &[1, 1, 2]]);
        assert_eq!(out, vec![(1, 2), (1, 1), (2, 0)]);
    }

    #[test]
    fn color_change_flushes() {
        let mut rle = RunLength::new();
        assert_eq!(rle.push([1u8, 2, 3]), None);
        assert_eq!(rle.push([1, 2, 3]), None);
        assert_eq!(rle.push([0, 0, 0]), Some(([1, 2, 3], 1)));
        assert!(!rle.is_empty());
        assert_eq!(rle.flush(), Some(([0, 0, 0], 0)));
        assert!(rle.is_empty());
        assert_eq!(rle.flush(), None);
    }
}
