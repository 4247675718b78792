//! C-compatible expression state shared with generated code.
//!
//! Every type here has a twin in `include/slowjit.h`; the generated functions
//! read and write these structures directly, so field order and widths are
//! part of the ABI.

/// Value word passed between steps and stored in result tuples.
pub type Datum = u64;

/// Signature of a compiled expression function.
pub type NativeEvalFn =
    unsafe extern "C" fn(state: *mut ExprState, econtext: *mut EvalContext, isnull: *mut bool) -> Datum;

/// Per-expression evaluation state.
#[repr(C)]
#[derive(Debug)]
pub struct ExprState {
    pub resvalue: Datum,
    pub resnull: bool,
    pub result: *mut ResultTuple,
}

/// Destination tuple as seen by generated code.
#[repr(C)]
#[derive(Debug)]
pub struct ResultTuple {
    pub natts: i32,
    pub values: *mut Datum,
    pub isnull: *mut bool,
}

/// Per-call context handed through to native functions.
///
/// Generated code never dereferences it.
#[repr(C)]
#[derive(Debug, Default)]
pub struct EvalContext {
    pub rows_evaluated: u64,
}

/// Owned storage behind a [`ResultTuple`].
///
/// The value and null arrays are boxed slices, so the raw view keeps pointing
/// at valid memory when the owner moves.
#[derive(Debug)]
pub struct TupleStorage {
    values: Box<[Datum]>,
    isnull: Box<[bool]>,
    raw: Box<ResultTuple>,
}

impl TupleStorage {
    pub fn new(natts: usize) -> Self {
        let mut values = vec![0 as Datum; natts].into_boxed_slice();
        let mut isnull = vec![true; natts].into_boxed_slice();
        let raw = Box::new(ResultTuple {
            natts: natts as i32,
            values: values.as_mut_ptr(),
            isnull: isnull.as_mut_ptr(),
        });
        Self { values, isnull, raw }
    }

    pub fn natts(&self) -> usize {
        self.values.len()
    }

    /// Value and null flag of one attribute.
    pub fn get(&self, slot: usize) -> Option<(Datum, bool)> {
        Some((*self.values.get(slot)?, *self.isnull.get(slot)?))
    }

    /// Reset every attribute to null.
    pub fn clear(&mut self) {
        self.values.fill(0);
        self.isnull.fill(true);
    }

    pub(crate) fn raw_mut(&mut self) -> *mut ResultTuple {
        &mut *self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_layout_matches_header() {
        // ExprState { u64, bool, ptr } with natural alignment.
        assert_eq!(std::mem::offset_of!(ExprState, resvalue), 0);
        assert_eq!(std::mem::offset_of!(ExprState, resnull), 8);
        assert_eq!(std::mem::offset_of!(ExprState, result), 16);
        assert_eq!(std::mem::offset_of!(ResultTuple, natts), 0);
        assert_eq!(
            std::mem::offset_of!(ResultTuple, values),
            std::mem::size_of::<usize>()
        );
    }

    #[test]
    fn test_tuple_storage_pointers_survive_move() {
        let mut storage = TupleStorage::new(3);
        let raw = storage.raw_mut();
        let moved = storage;
        let values = unsafe { (*raw).values };
        assert_eq!(values as *const Datum, moved.values.as_ptr());
        assert_eq!(moved.natts(), 3);
        assert_eq!(moved.get(0), Some((0, true)));
        assert_eq!(moved.get(3), None);
    }
}
