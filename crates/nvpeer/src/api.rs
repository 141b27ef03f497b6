//! # Host API Wrappers
//!
//! Typed wrappers for a subset of the host's `nvim_*` methods. Each entry in the
//! table below becomes two methods with the same name:
//!
//! - on [`Peer`]: `async fn name(&self, ..) -> Result<T>`, which waits for the reply;
//! - on [`Pipeline`]: `fn name(&mut self, ..) -> Slot<T>`, which does not.

use nvwire::Buffer;
use nvwire::Tabpage;
use nvwire::Value;
use nvwire::Window;

use crate::error::Result;
use crate::peer::Peer;
use crate::pipeline::Pipeline;
use crate::pipeline::Slot;

macro_rules! host_api {
    ($(
        $(#[$doc:meta])*
        fn $name:ident($($arg:ident: $ty:ty),*) -> $ret:ty = $method:literal;
    )*) => {
        impl Peer {
            $(
                $(#[$doc])*
                pub async fn $name(&self, $($arg: $ty),*) -> Result<$ret> {
                    self.call($method, vec![$(Value::from($arg)),*]).await
                }
            )*
        }

        impl Pipeline {
            $(
                $(#[$doc])*
                pub fn $name(&mut self, $($arg: $ty),*) -> Slot<$ret> {
                    self.call($method, vec![$(Value::from($arg)),*])
                }
            )*
        }
    };
}

host_api! {
    /// Runs an Ex command.
    fn command(cmd: &str) -> () = "nvim_command";
    /// Runs an Ex command and returns its output.
    fn command_output(cmd: &str) -> String = "nvim_command_output";
    /// Evaluates a host expression.
    fn eval(expr: &str) -> Value = "nvim_eval";
    /// Calls a host function with the given arguments.
    fn call_function(fname: &str, args: Vec<Value>) -> Value = "nvim_call_function";

    fn buffers() -> Vec<Buffer> = "nvim_list_bufs";
    fn current_buffer() -> Buffer = "nvim_get_current_buf";
    fn set_current_buffer(buffer: Buffer) -> () = "nvim_set_current_buf";
    fn windows() -> Vec<Window> = "nvim_list_wins";
    fn current_window() -> Window = "nvim_get_current_win";
    fn set_current_window(window: Window) -> () = "nvim_set_current_win";
    fn tabpages() -> Vec<Tabpage> = "nvim_list_tabpages";
    fn current_tabpage() -> Tabpage = "nvim_get_current_tabpage";
    fn set_current_tabpage(tabpage: Tabpage) -> () = "nvim_set_current_tabpage";

    fn buffer_line_count(buffer: Buffer) -> i64 = "nvim_buf_line_count";
    /// Lines `start..end` of a buffer, zero-based, end-exclusive. Negative
    /// indices count from the end.
    fn buffer_lines(buffer: Buffer, start: i64, end: i64, strict: bool) -> Vec<String> = "nvim_buf_get_lines";
    /// Replaces lines `start..end` of a buffer.
    fn set_buffer_lines(buffer: Buffer, start: i64, end: i64, strict: bool, lines: Vec<String>) -> () = "nvim_buf_set_lines";
    fn buffer_name(buffer: Buffer) -> String = "nvim_buf_get_name";

    /// Whether the buffer still exists in the host.
    fn is_buffer_valid(buffer: Buffer) -> bool = "nvim_buf_is_valid";
    fn is_window_valid(window: Window) -> bool = "nvim_win_is_valid";
    fn is_tabpage_valid(tabpage: Tabpage) -> bool = "nvim_tabpage_is_valid";

    fn window_buffer(window: Window) -> Buffer = "nvim_win_get_buf";
    /// One-based row, zero-based column.
    fn window_cursor(window: Window) -> (i64, i64) = "nvim_win_get_cursor";
    fn tabpage_window(tabpage: Tabpage) -> Window = "nvim_tabpage_get_win";

    /// A global (`g:`) variable.
    fn var(name: &str) -> Value = "nvim_get_var";
    fn set_var(name: &str, value: Value) -> () = "nvim_set_var";
    /// The channel id and API metadata.
    fn api_info() -> (i64, Value) = "nvim_get_api_info";
}
