use crate::{exit, println};

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    if let Some(location) = info.location() {
        println!(
            "panicked at {}:{}: {}",
            location.file(),
            location.line(),
            info.message()
        );
    } else {
        println!("panicked: {}", info.message());
    }
    exit()
}
