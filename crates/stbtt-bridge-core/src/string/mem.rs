//! Memory operations: copy, overlapping move, and fill.

/// Copies `n` bytes from `src` to `dest`.
///
/// Only copies `min(n, src.len(), dest.len())` bytes. Returns the number of
/// bytes actually copied.
pub fn copy_memory(dest: &mut [u8], src: &[u8], n: usize) -> usize {
    let count = n.min(dest.len()).min(src.len());
    dest[..count].copy_from_slice(&src[..count]);
    count
}

/// Copies `n` bytes inside one buffer from offset `src` to offset `dest`.
///
/// The ranges may overlap. The count is clamped so both ranges stay inside
/// `buf`. Returns the number of bytes moved.
pub fn move_within(buf: &mut [u8], src: usize, dest: usize, n: usize) -> usize {
    let len = buf.len();
    if src >= len || dest >= len {
        return 0;
    }
    let count = n.min(len - src).min(len - dest);
    buf.copy_within(src..src + count, dest);
    count
}

/// The byte a C fill value stores: the low eight bits of `c`.
#[inline]
pub const fn fill_byte(c: i32) -> u8 {
    (c & 0xFF) as u8
}

/// Fills the first `n` bytes of `dest` with `fill_byte(c)`.
///
/// Returns the number of bytes actually set.
pub fn fill_memory(dest: &mut [u8], c: i32, n: usize) -> usize {
    let count = n.min(dest.len());
    dest[..count].fill(fill_byte(c));
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_transfers_prefix() {
        let src = [1u8, 2, 3, 4, 5];
        let mut dest = [0u8; 5];
        assert_eq!(copy_memory(&mut dest, &src, 3), 3);
        assert_eq!(dest, [1, 2, 3, 0, 0]);
    }

    #[test]
    fn copy_clamps_to_shorter_slice() {
        let src = [9u8; 2];
        let mut dest = [0u8; 4];
        assert_eq!(copy_memory(&mut dest, &src, 10), 2);
        assert_eq!(dest, [9, 9, 0, 0]);
    }

    #[test]
    fn copy_zero_is_noop() {
        let mut dest = [7u8; 3];
        assert_eq!(copy_memory(&mut dest, &[1, 2, 3], 0), 0);
        assert_eq!(dest, [7, 7, 7]);
    }

    #[test]
    fn move_handles_forward_and_backward_overlap() {
        let mut buf = *b"abcdefgh";
        assert_eq!(move_within(&mut buf, 0, 2, 4), 4);
        assert_eq!(&buf, b"ababcdgh");

        let mut buf = *b"abcdefgh";
        assert_eq!(move_within(&mut buf, 2, 0, 4), 4);
        assert_eq!(&buf, b"cdefefgh");
    }

    #[test]
    fn move_clamps_at_buffer_end() {
        let mut buf = *b"abcdef";
        assert_eq!(move_within(&mut buf, 0, 4, 6), 2);
        assert_eq!(&buf, b"abcdab");
        assert_eq!(move_within(&mut buf, 9, 0, 1), 0);
    }

    #[test]
    fn fill_uses_low_byte() {
        let mut dest = [0u8; 4];
        assert_eq!(fill_memory(&mut dest, 0x1AB, 4), 4);
        assert_eq!(dest, [0xAB; 4]);
        assert_eq!(fill_byte(-1), 0xFF);
        assert_eq!(fill_byte(256), 0);
    }

    #[test]
    fn fill_partial() {
        let mut dest = [1u8; 5];
        assert_eq!(fill_memory(&mut dest, 0, 2), 2);
        assert_eq!(dest, [0, 0, 1, 1, 1]);
        assert_eq!(fill_memory(&mut dest, 3, 99), 5);
        assert_eq!(dest, [3; 5]);
    }
}
