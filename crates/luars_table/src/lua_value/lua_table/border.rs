// Border search for the length operator
use super::LuaTable;

impl LuaTable {
    #[inline(always)]
    fn present(&self, key: i64) -> bool {
        self.get_int(key).is_some()
    }

    /// Some border `n`: `n == 0` or `t[n]` present, and `t[n + 1]` absent.
    ///
    /// With holes any border may be returned.
    pub fn raw_len(&self) -> i64 {
        let limit = self.array.len();
        if limit > 0 && self.weak_policy.array_get(&self.array[limit - 1]).is_none() {
            // there is a border inside the array region
            let (mut i, mut j) = (0usize, limit);
            while j - i > 1 {
                let m = i + (j - i) / 2;
                if self.weak_policy.array_get(&self.array[m - 1]).is_some() {
                    i = m;
                } else {
                    j = m;
                }
            }
            return i as i64;
        }
        if self.hash_count == 0 {
            return limit as i64;
        }
        self.hash_search(limit as i64)
    }

    /// `j` is present (or zero); probe past it by doubling, then bisect
    fn hash_search(&self, j: i64) -> i64 {
        let mut i = j;
        let mut j = j + 1;
        while self.present(j) {
            i = j;
            if j > i64::MAX / 2 {
                // pathological table: fall back to a linear scan
                let mut n = 1;
                while self.present(n) {
                    n += 1;
                }
                return n - 1;
            }
            j *= 2;
        }
        while j - i > 1 {
            let m = i + (j - i) / 2;
            if self.present(m) {
                i = m;
            } else {
                j = m;
            }
        }
        i
    }
}
