mod dashboard;
mod form_view;
mod record_detail;
mod resource_list;
mod rows;

pub use dashboard::DashboardView;
pub use form_view::FormView;
pub use record_detail::RecordDetailView;
pub use resource_list::ResourceListView;
