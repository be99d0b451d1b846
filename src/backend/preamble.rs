use indoc::indoc;

/// Declarations placed ahead of every generated module, providing the
/// `@print<type>` routines that `log` lowers to
pub const DEFAULT_PREAMBLE: &str = indoc! {r#"
    declare i32 @printf(ptr, ...)

    @.fmt.i32 = private unnamed_addr constant [4 x i8] c"%d\0A\00"
    @.fmt.ptr = private unnamed_addr constant [4 x i8] c"%s\0A\00"

    define void @printi32(i32 %value) {
    	call i32 (ptr, ...) @printf(ptr @.fmt.i32, i32 %value)
    	ret void
    }

    define void @printi1(i1 %value) {
    	%1 = zext i1 %value to i32
    	call i32 (ptr, ...) @printf(ptr @.fmt.i32, i32 %1)
    	ret void
    }

    define void @printptr(ptr %value) {
    	call i32 (ptr, ...) @printf(ptr @.fmt.ptr, ptr %value)
    	ret void
    }
"#};
