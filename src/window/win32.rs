//! Native GDI window for Windows.
//!
//! The window procedure only translates messages into [`WindowEvent`]s and
//! queues them for the pump; all handling happens in the event loop. The
//! surface is blitted with `StretchDIBits` as a top-down 32-bit DIB, which
//! matches the `0x00RRGGBB` pixel layout.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::ffi::c_void;
use std::sync::Arc;

use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{
    GetLastError, BOOL, ERROR_CLASS_ALREADY_EXISTS, HWND, LPARAM, LRESULT, RECT, WPARAM,
};
use windows::Win32::Graphics::Gdi::{
    GetDC, InvalidateRect, ReleaseDC, StretchDIBits, ValidateRect, BITMAPINFO,
    BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, SRCCOPY,
};
use windows::Win32::System::Diagnostics::Debug::MessageBeep;
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    AdjustWindowRect, CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW,
    GetMessageW, LoadCursorW, PostMessageW, PostQuitMessage, RegisterClassExW, TranslateMessage,
    CS_HREDRAW, CS_VREDRAW, CW_USEDEFAULT, IDC_ARROW, MB_OK, MSG, WINDOW_EX_STYLE, WM_CHAR,
    WM_CLOSE, WM_DESTROY, WM_ERASEBKGND, WM_KEYDOWN, WM_PAINT, WNDCLASSEXW, WS_CAPTION,
    WS_MINIMIZEBOX, WS_OVERLAPPED, WS_SYSMENU, WS_VISIBLE,
};

use super::{Backend, EventPoster, EventPump, NativeWindow, Presenter, WindowEvent};
use crate::config::Config;
use crate::core::surface::{Rect, Surface};
use crate::error::BackendError;

const CLASS_NAME: PCWSTR = w!("LabWindowClass");

thread_local! {
    /// Events translated by the window procedure, drained by the pump
    static PENDING: RefCell<VecDeque<WindowEvent>> = RefCell::new(VecDeque::new());
}

/// HWND stored as an integer so it can cross threads
#[derive(Clone, Copy)]
struct RawHwnd(isize);

impl RawHwnd {
    fn hwnd(self) -> HWND {
        HWND(self.0 as *mut c_void)
    }
}

pub struct Win32Backend;

impl Backend for Win32Backend {
    fn name(&self) -> &'static str {
        "win32"
    }

    fn open(&self, config: &Config) -> Result<NativeWindow, BackendError> {
        let hwnd = unsafe { create_window(config)? };
        let raw = RawHwnd(hwnd.0 as isize);
        Ok(NativeWindow {
            pump: Box::new(Win32Pump { hwnd: raw }),
            presenter: Arc::new(Win32Presenter { hwnd: raw }),
            poster: Arc::new(Win32Poster { hwnd: raw }),
        })
    }
}

unsafe fn create_window(config: &Config) -> Result<HWND, BackendError> {
    let instance = GetModuleHandleW(None)
        .map_err(|e| BackendError::ClassRegistration(e.to_string()))?;

    let class = WNDCLASSEXW {
        cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
        style: CS_HREDRAW | CS_VREDRAW,
        lpfnWndProc: Some(window_proc),
        hInstance: instance.into(),
        hCursor: LoadCursorW(None, IDC_ARROW).unwrap_or_default(),
        lpszClassName: CLASS_NAME,
        ..Default::default()
    };
    // A second session in the same process finds the class registered
    if RegisterClassExW(&class) == 0 && GetLastError() != ERROR_CLASS_ALREADY_EXISTS {
        return Err(BackendError::ClassRegistration(
            windows::core::Error::from_win32().to_string(),
        ));
    }

    // Fixed-size window whose client area fits the scaled surface
    let style = WS_OVERLAPPED | WS_CAPTION | WS_SYSMENU | WS_MINIMIZEBOX | WS_VISIBLE;
    let mut rc = RECT {
        left: 0,
        top: 0,
        right: (config.width * config.scale) as i32,
        bottom: (config.height * config.scale) as i32,
    };
    AdjustWindowRect(&mut rc, style, BOOL::from(false))
        .map_err(|e| BackendError::WindowCreation(e.to_string()))?;

    let title: Vec<u16> = config.title.encode_utf16().chain(std::iter::once(0)).collect();
    CreateWindowExW(
        WINDOW_EX_STYLE::default(),
        CLASS_NAME,
        PCWSTR(title.as_ptr()),
        style,
        CW_USEDEFAULT,
        CW_USEDEFAULT,
        rc.right - rc.left,
        rc.bottom - rc.top,
        None,
        None,
        instance,
        None,
    )
    .map_err(|e| BackendError::WindowCreation(e.to_string()))
}

extern "system" fn window_proc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    // Bits 0..15 of lParam hold the auto-repeat count
    let repeat = (lparam.0 & 0xFFFF) as u16;
    let event = match msg {
        WM_PAINT => {
            unsafe {
                let _ = ValidateRect(hwnd, None);
            }
            WindowEvent::Paint { full: true }
        }
        WM_KEYDOWN => WindowEvent::KeyDown {
            vk: wparam.0 as u16,
            repeat,
        },
        WM_CHAR => WindowEvent::Char {
            code: wparam.0 as u32,
            repeat,
        },
        WM_CLOSE => WindowEvent::CloseRequested,
        WM_DESTROY => {
            unsafe { PostQuitMessage(0) };
            return LRESULT(0);
        }
        // The whole client area is repainted from the surface
        WM_ERASEBKGND => return LRESULT(1),
        _ => return unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
    };
    PENDING.with(|queue| queue.borrow_mut().push_back(event));
    LRESULT(0)
}

struct Win32Pump {
    hwnd: RawHwnd,
}

impl EventPump for Win32Pump {
    fn next_event(&mut self) -> Option<WindowEvent> {
        loop {
            if let Some(event) = PENDING.with(|queue| queue.borrow_mut().pop_front()) {
                return Some(event);
            }
            let mut msg = MSG::default();
            let ret = unsafe { GetMessageW(&mut msg, HWND::default(), 0, 0) };
            match ret.0 {
                0 => return None,
                -1 => {
                    tracing::error!("GetMessageW failed: {}", windows::core::Error::from_win32());
                    return None;
                }
                _ => unsafe {
                    let _ = TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                },
            }
        }
    }

    fn destroy(&mut self) {
        if let Err(e) = unsafe { DestroyWindow(self.hwnd.hwnd()) } {
            tracing::error!("DestroyWindow failed: {}", e);
            unsafe { PostQuitMessage(0) };
        }
    }

    fn beep(&self) {
        unsafe {
            let _ = MessageBeep(MB_OK);
        }
    }
}

struct Win32Presenter {
    hwnd: RawHwnd,
}

impl Presenter for Win32Presenter {
    fn present(&self, surface: &Surface, _area: Rect, scale: u32) -> Result<(), BackendError> {
        // The whole surface is blitted; partial StretchDIBits on top-down
        // DIBs measures the source origin from the bottom
        let (w, h) = (surface.width() as i32, surface.height() as i32);
        let s = scale as i32;
        let info = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: w,
                biHeight: -h,
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            ..Default::default()
        };

        unsafe {
            let hwnd = self.hwnd.hwnd();
            let hdc = GetDC(hwnd);
            if hdc.is_invalid() {
                return Err(BackendError::Present("GetDC returned null".to_string()));
            }
            let lines = StretchDIBits(
                hdc,
                0,
                0,
                w * s,
                h * s,
                0,
                0,
                w,
                h,
                Some(surface.pixels().as_ptr() as *const c_void),
                &info,
                DIB_RGB_COLORS,
                SRCCOPY,
            );
            ReleaseDC(hwnd, hdc);
            if lines == 0 {
                return Err(BackendError::Present(windows::core::Error::from_win32().to_string()));
            }
        }
        Ok(())
    }
}

struct Win32Poster {
    hwnd: RawHwnd,
}

impl EventPoster for Win32Poster {
    fn post(&self, event: WindowEvent) -> Result<(), BackendError> {
        let hwnd = self.hwnd.hwnd();
        let (msg, wparam, lparam) = match event {
            WindowEvent::CloseRequested => (WM_CLOSE, 0, 0),
            WindowEvent::KeyDown { vk, repeat } => (WM_KEYDOWN, vk as usize, repeat as isize),
            WindowEvent::Char { code, repeat } => (WM_CHAR, code as usize, repeat as isize),
            WindowEvent::Paint { .. } => {
                unsafe {
                    let _ = InvalidateRect(hwnd, None, BOOL::from(false));
                }
                return Ok(());
            }
        };
        unsafe { PostMessageW(hwnd, msg, WPARAM(wparam), LPARAM(lparam)) }
            .map_err(|_| BackendError::Disconnected)
    }
}
