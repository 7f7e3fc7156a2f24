/// Build [`BoundValues`](crate::BoundValues) from `key => value` pairs.
///
/// Integer keys are positional, string keys are placeholder names.
///
/// ```
/// use dbrs::{bound, SqlValue};
///
/// let values = bound! { "name" => "Ann", "age" => 30, "nickname" => SqlValue::Null };
/// assert_eq!(values.len(), 3);
///
/// let values = bound! { 1 => "Ann", 2 => true };
/// assert_eq!(values.len(), 2);
/// ```
#[macro_export]
macro_rules! bound {
    () => {
        $crate::BoundValues::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut values = $crate::BoundValues::new();
        $(
            values.push($key, $value);
        )+
        values
    }};
}
