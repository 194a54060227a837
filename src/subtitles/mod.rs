/*!
 * Subtitle layout: wrapping by equivalent width, bilingual pagination and
 * the burned-in render style.
 */

pub mod layout;
pub mod paginator;
pub mod style;

pub use paginator::{Paginator, allocate, paginate, paginate_with_floor};
pub use style::{StyleConfig, compute_render_style};
