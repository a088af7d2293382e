// Heap sort over the sequence part of the array region
use crate::LuaResult;
use crate::lua_value::LuaValue;

use super::LuaTable;

/// In-place heap sort. `less(a, b)` may fail; the error is returned as-is and
/// `values` is left in some permutation of its input.
pub fn heap_sort<F>(values: &mut [LuaValue], mut less: F) -> LuaResult<()>
where
    F: FnMut(&LuaValue, &LuaValue) -> LuaResult<bool>,
{
    let count = values.len();
    if count < 2 {
        return Ok(());
    }
    for start in (0..count / 2).rev() {
        sift_down(values, start, count - 1, &mut less)?;
    }
    let mut end = count - 1;
    while end > 0 {
        values.swap(end, 0);
        end -= 1;
        sift_down(values, 0, end, &mut less)?;
    }
    Ok(())
}

fn sift_down<F>(values: &mut [LuaValue], start: usize, end: usize, less: &mut F) -> LuaResult<()>
where
    F: FnMut(&LuaValue, &LuaValue) -> LuaResult<bool>,
{
    let mut root = start;
    while root * 2 < end {
        let mut child = root * 2 + 1;
        if child < end && less(&values[child], &values[child + 1])? {
            child += 1;
        }
        if less(&values[root], &values[child])? {
            values.swap(root, child);
            root = child;
        } else {
            return Ok(());
        }
    }
    Ok(())
}

impl LuaTable {
    /// Leading run of present values in the array region
    pub fn sequence(&self) -> Vec<LuaValue> {
        self.array
            .iter()
            .map_while(|stored| self.weak_policy.array_get(stored))
            .collect()
    }

    /// Overwrite array slots `1..=values.len()`
    pub(crate) fn store_sequence(&mut self, values: Vec<LuaValue>) {
        let policy = self.weak_policy;
        for (slot, value) in self.array.iter_mut().zip(values) {
            *slot = Some(policy.wrap(value));
        }
    }

    /// Sort the sequence part with `less`. Integer keys living in the hash
    /// region are not touched. The table is only updated if every comparison
    /// succeeded.
    pub fn sort_by<F>(&mut self, less: F) -> LuaResult<()>
    where
        F: FnMut(&LuaValue, &LuaValue) -> LuaResult<bool>,
    {
        let mut values = self.sequence();
        if values.len() < 2 {
            return Ok(());
        }
        heap_sort(&mut values, less)?;
        self.store_sequence(values);
        Ok(())
    }
}
