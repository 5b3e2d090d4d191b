/// Tunables handed to a backend at construction.
///
/// There is no configuration file: embedders fill this struct (or take
/// [`Config::default`]) and pass it to [`configurator`](crate::configurator).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// Metric of an installed default route. On Linux `0` leaves the route
    /// priority to the kernel.
    pub route_metric: u32,
    /// Network shell used for subprocess calls on Windows.
    pub netsh: String,
    /// First buffer size tried for size-negotiated OS table queries.
    pub table_buffer_initial: usize,
    /// The buffer is doubled while the OS reports it as too small, up to this size.
    pub table_buffer_max: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            route_metric: if cfg!(target_os = "windows") { 25 } else { 0 },
            netsh: "netsh".to_string(),
            table_buffer_initial: 1024,
            table_buffer_max: 128 * 1024,
        }
    }
}
